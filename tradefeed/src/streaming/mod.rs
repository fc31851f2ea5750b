/// Reconnect delay policy.
pub mod backoff;
/// Connection driver task.
pub mod connection;
/// Connection state machine.
pub mod connection_sm;
pub(crate) mod session;

pub use backoff::{Backoff, jitter_wait};
pub use connection::{ConnectionParams, StreamConnection, spawn_connection};
pub use connection_sm::ConnectionState;
