use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the tradefeed workspace.
///
/// Covers transport faults raised by a streaming subscription, failures to open
/// one, malformed payloads, consumer faults surfaced by the dispatcher, and
/// misuse of the feed registry.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedError {
    /// The live subscription reported a transport problem (disconnect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Opening a streaming subscription failed.
    #[error("failed to open {stream} stream: {msg}")]
    Open {
        /// Label of the stream that failed to open (e.g. "account", "candles:BTCUSDT").
        stream: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A transport message could not be converted into a domain event.
    #[error("decode error in `{field}`: {msg}")]
    Decode {
        /// Name of the offending field.
        field: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A registered consumer failed while handling an event.
    #[error("consumer {consumer} failed: {msg}")]
    Consumer {
        /// Consumer label.
        consumer: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The feed is already dispatching; the registry is frozen.
    #[error("feed already started")]
    AlreadyStarted,

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl FeedError {
    /// Helper: build a `Transport` error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Helper: build an `Open` error for a stream label and message.
    pub fn open(stream: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Open {
            stream: stream.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Decode` error for a field and message.
    pub fn decode(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            field: field.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Consumer` error.
    pub fn consumer(consumer: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Consumer {
            consumer: consumer.into(),
            msg: msg.into(),
        }
    }

    /// Returns true if the reconnect loop is expected to recover from this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Open { .. })
    }

    /// Returns true for malformed-payload errors.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
