use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::stream::StreamHandle;
use crate::types::{Event, FeedError, Symbol};

/// Which exchange-side subscription to open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamTarget {
    /// Candle (kline) updates for one symbol at a given interval, e.g. `1m`.
    Candles {
        /// Instrument to stream.
        symbol: Symbol,
        /// Exchange interval label.
        interval: String,
    },
    /// Account-wide order updates for every symbol.
    Account,
}

impl StreamTarget {
    /// Helper: candle stream target.
    pub fn candles(symbol: impl Into<Symbol>, interval: impl Into<String>) -> Self {
        Self::Candles {
            symbol: symbol.into(),
            interval: interval.into(),
        }
    }

    /// Symbol for per-symbol streams; `None` for the account stream.
    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Candles { symbol, .. } => Some(symbol),
            Self::Account => None,
        }
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Candles { symbol, interval } => write!(f, "candles:{symbol}@{interval}"),
            Self::Account => f.write_str("account"),
        }
    }
}

/// One transport message as delivered by the exchange, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Parsed JSON payload.
    pub payload: serde_json::Value,
}

impl RawMessage {
    /// Wrap an already-parsed payload.
    #[must_use]
    pub const fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }

    /// Parse a text frame.
    ///
    /// # Errors
    /// Returns `FeedError::Decode` if the frame is not valid JSON.
    pub fn from_text(text: &str) -> Result<Self, FeedError> {
        serde_json::from_str(text)
            .map(Self::new)
            .map_err(|e| FeedError::decode("payload", e.to_string()))
    }
}

/// A live exchange subscription.
///
/// The `messages` channel closing is the subscription's "done" signal. Errors
/// the subscription reports without terminating arrive on `errors`.
#[derive(Debug)]
pub struct StreamSession {
    /// Owner of the vendor task; stopping it ends the subscription.
    pub handle: StreamHandle,
    /// Raw transport messages, in arrival order.
    pub messages: mpsc::Receiver<RawMessage>,
    /// Non-terminal errors raised by the subscription.
    pub errors: mpsc::Receiver<FeedError>,
}

/// Capability to open exchange-side streaming subscriptions.
///
/// Implementations hold the shared exchange client (credentials, HTTP/WebSocket
/// client) and must not mutate it after construction. Every call to `open`
/// starts a fresh subscription; reconnecting is the caller's job.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// A stable identifier for logs.
    fn name(&self) -> &'static str;

    /// Open one subscription.
    async fn open(&self, target: &StreamTarget) -> Result<StreamSession, FeedError>;
}

/// Converts transport messages into domain events.
pub trait MessageDecoder: Send + Sync {
    /// Decode one message received on `target`.
    ///
    /// Returns `Ok(None)` for well-formed messages that carry no feed event
    /// (heartbeats, balance updates on the account stream, ...).
    ///
    /// # Errors
    /// Returns `FeedError::Decode` for malformed payloads.
    fn decode(&self, target: &StreamTarget, raw: RawMessage) -> Result<Option<Event>, FeedError>;
}

/// Produces one metadata entry for a completed candle.
pub trait MetadataFetcher: Send + Sync {
    /// Return the `(key, value)` pair to store in the candle's metadata.
    fn fetch(&self, symbol: &Symbol, time: DateTime<Utc>) -> (String, f64);
}

impl<F> MetadataFetcher for F
where
    F: Fn(&Symbol, DateTime<Utc>) -> (String, f64) + Send + Sync,
{
    fn fetch(&self, symbol: &Symbol, time: DateTime<Utc>) -> (String, f64) {
        self(symbol, time)
    }
}
