//! Re-export of foundational types from `tradefeed-types`.
// Consolidated re-exports so downstream crates can depend on `tradefeed-core` only

pub use tradefeed_types::{
    BackoffConfig, ConnectionConfig, ConsumerFaultPolicy, DecodeFaultPolicy, FeedConfig,
    FeedError,
};
pub use tradefeed_types::{CandleEvent, Event, OrderEvent, OrderStatus, OrderType, Side, Symbol};

pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;
