//! Tradefeed data model, error type, and configuration primitives shared by every crate in the workspace.
#![warn(missing_docs)]

mod config;
mod error;
mod model;

pub use config::{
    BackoffConfig, ConnectionConfig, ConsumerFaultPolicy, DecodeFaultPolicy, FeedConfig,
};
pub use error::FeedError;
pub use model::{CandleEvent, Event, OrderEvent, OrderStatus, OrderType, Side, Symbol};
