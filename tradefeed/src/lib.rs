//! Tradefeed distributes real-time exchange events to the consumers of a trading
//! application.
//!
//! Overview
//! - [`EventFeed`] fans events out per symbol: one dispatch task per symbol
//!   delivers each event to every registered consumer, in registration order.
//! - [`spawn_connection`] keeps one exchange subscription alive: it decodes raw
//!   messages into events and reopens the subscription with exponential backoff
//!   whenever it fails or ends, until cancelled.
//! - [`FeedController`] wires connections into a feed and reports their errors to
//!   an [`ErrorObserver`].
//! - Vendor specifics live behind the `tradefeed_core` traits (`StreamSource`,
//!   `MessageDecoder`, `MetadataFetcher`).
//!
//! Key behaviors and trade-offs
//! - Backpressure: each symbol's inbound slot holds one event, so a slow consumer
//!   slows publishers of that symbol rather than buffering without bound.
//! - Consumer faults: isolated by default (report, keep delivering);
//!   `ConsumerFaultPolicy::Abort` stops the symbol's dispatch on the first fault.
//! - Decode faults: close the connection by default;
//!   `DecodeFaultPolicy::Reconnect` and `Skip` keep the stream alive.
//! - Reconnects: delays grow from `min_backoff_ms` by `factor` up to
//!   `max_backoff_ms` and reset after every successful open. Optional jitter
//!   spreads reconnects of many connections.
//! - No durable delivery, no deduplication, no ordering across symbols.
//!
//! Examples
//! Registering consumers and starting the feed:
//! ```rust,ignore
//! use std::sync::Arc;
//! use tradefeed::EventFeed;
//! use tradefeed_core::consumer_fn;
//!
//! let mut feed = EventFeed::new();
//! feed.subscribe("BTCUSDT", consumer_fn("strategy", |e| println!("{e:?}")), false)?;
//! feed.subscribe("BTCUSDT", consumer_fn("orders", |e| println!("{e:?}")), true)?;
//! let feed = Arc::new(feed);
//! feed.start()?;
//! ```
//!
//! Streaming account updates into it:
//! ```rust,ignore
//! use tradefeed::FeedController;
//! use tradefeed_core::{ConnectionConfig, FuturesDecoder};
//!
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let controller = FeedController::spawn(
//!     feed.clone(),
//!     exchange_source,
//!     Arc::new(FuturesDecoder::new()),
//!     ConnectionConfig::default(),
//!     stop_rx,
//! );
//! // ... trade ...
//! stop_tx.send_replace(true);
//! controller.stop().await;
//! feed.shutdown().await;
//! ```
//!
//! See `tradefeed/examples/` for a runnable demonstration.
#![warn(missing_docs)]

mod controller;
mod feed;
mod observer;
/// Reconnecting stream connections and their backoff policy.
pub mod streaming;

pub use controller::FeedController;
pub use feed::EventFeed;
pub use observer::{ErrorObserver, LogObserver};
pub use streaming::{
    Backoff, ConnectionParams, ConnectionState, StreamConnection, jitter_wait, spawn_connection,
};

// Re-export core types for convenience
pub use tradefeed_core::{
    BackoffConfig, CandleEvent, ConnectionConfig, ConsumerFaultPolicy, DecodeFaultPolicy, Event,
    FeedConfig, FeedConsumer, FeedError, FuturesDecoder, MessageDecoder, MetadataFetcher,
    OrderEvent, OrderStatus, OrderType, RawMessage, Side, StreamHandle, StreamSession,
    StreamSource, StreamTarget, Symbol, consumer_fn, try_consumer_fn,
};
