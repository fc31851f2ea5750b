//! Configuration types shared by the feed, its stream connections, and the controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a stream connection does after a message fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DecodeFaultPolicy {
    /// Report the fault once and close the connection for good.
    #[default]
    Close,
    /// Report the fault, drop the live session and reconnect after backoff.
    Reconnect,
    /// Report the fault and keep streaming.
    Skip,
}

/// What the dispatcher does when a consumer fails while handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConsumerFaultPolicy {
    /// Report the fault and keep delivering to the remaining consumers.
    #[default]
    Isolate,
    /// Stop delivering the event and terminate the symbol's dispatch task.
    Abort,
}

/// Exponential backoff configuration for reconnecting streaming sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl BackoffConfig {
    /// Minimum delay as a `Duration`.
    #[must_use]
    pub const fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    /// Maximum delay as a `Duration`.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 100,
            max_backoff_ms: 1_000,
            factor: 2,
            jitter_percent: 0,
        }
    }
}

/// Settings for a single reconnecting stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
    /// Behavior on malformed payloads.
    pub decode_fault: DecodeFaultPolicy,
    /// Capacity of the decoded-event output channel.
    pub event_capacity: usize,
    /// Capacity of the error output channel.
    pub error_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            decode_fault: DecodeFaultPolicy::default(),
            event_capacity: 1,
            error_capacity: 16,
        }
    }
}

/// Global configuration for an event feed and the controller feeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Behavior on consumer faults during dispatch.
    pub consumer_fault: ConsumerFaultPolicy,
    /// Settings applied to every stream connection the controller opens.
    pub connection: ConnectionConfig,
}
