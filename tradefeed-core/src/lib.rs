//! tradefeed-core
//!
//! Capability traits and primitives shared across the tradefeed ecosystem.
//!
//! - `types`: the domain model and error/config types from `tradefeed-types`.
//! - `connector`: `StreamSource`, `MessageDecoder` and `MetadataFetcher`, the
//!   boundary to the exchange adapter layer.
//! - `consumer`: the `FeedConsumer` capability invoked by the dispatcher.
//! - `decode`: `FuturesDecoder`, a reference decoder for the futures wire format.
//!
//! Async runtime (Tokio)
//! ---------------------
//! Streaming sessions are expressed with Tokio types:
//!
//! - `stream::StreamHandle` wraps `tokio::task::JoinHandle<()>` and uses
//!   `tokio::sync::oneshot::Sender<()>` for cooperative shutdown.
//! - `connector::StreamSession` carries `tokio::sync::mpsc::Receiver`s for raw
//!   messages and subscription errors.
//!
//! Code that opens streams must therefore run under a Tokio 1.x runtime.
//!
#![warn(missing_docs)]

/// Exchange-facing capability traits.
pub mod connector;
/// Consumer capability invoked by the dispatcher.
pub mod consumer;
/// Reference decoder for the futures wire format.
pub mod decode;
/// Stream handle and its shutdown primitives.
pub mod stream;
pub mod types;

pub use connector::{
    MessageDecoder, MetadataFetcher, RawMessage, StreamSession, StreamSource, StreamTarget,
};
pub use consumer::{FeedConsumer, consumer_fn, try_consumer_fn};
pub use decode::FuturesDecoder;
pub use stream::StreamHandle;
pub use types::*;
