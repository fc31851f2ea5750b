//! Domain events flowing through the feed.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a tradable instrument, e.g. `BTCUSDT`. Used as the fan-out key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from any string-like value.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Borrow the symbol text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        #[non_exhaustive]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// Any value the exchange sends that has no dedicated variant.
            Other(String),
        }

        impl $name {
            /// Wire representation used by the exchange.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $($wire => Self::$variant,)+
                    other => Self::Other(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Order type as reported by the exchange.
    OrderType {
        /// Limit order.
        Limit => "LIMIT",
        /// Market order.
        Market => "MARKET",
        /// Stop-limit order.
        Stop => "STOP",
        /// Stop-market order.
        StopMarket => "STOP_MARKET",
        /// Take-profit limit order.
        TakeProfit => "TAKE_PROFIT",
        /// Take-profit market order.
        TakeProfitMarket => "TAKE_PROFIT_MARKET",
        /// Trailing stop order.
        TrailingStopMarket => "TRAILING_STOP_MARKET",
        /// Post-only limit order.
        LimitMaker => "LIMIT_MAKER",
    }
}

wire_enum! {
    /// Order lifecycle status as reported by the exchange.
    OrderStatus {
        /// Accepted, nothing filled yet.
        New => "NEW",
        /// Partially filled.
        PartiallyFilled => "PARTIALLY_FILLED",
        /// Fully filled.
        Filled => "FILLED",
        /// Cancelled by the user.
        Canceled => "CANCELED",
        /// Cancellation in flight.
        PendingCancel => "PENDING_CANCEL",
        /// Rejected by the exchange.
        Rejected => "REJECTED",
        /// Expired by the exchange.
        Expired => "EXPIRED",
    }
}

/// Order-state update pushed by the account stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Exchange-assigned order identifier.
    pub exchange_id: i64,
    /// Instrument the order belongs to.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Order type.
    pub order_type: OrderType,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Average fill price.
    pub price: Decimal,
    /// Accumulated filled quantity.
    pub quantity: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Price candle update pushed by a candle stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleEvent {
    /// Instrument the candle belongs to.
    pub symbol: Symbol,
    /// Interval open time.
    pub time: DateTime<Utc>,
    /// Time of this update.
    pub updated_at: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Close (or last) price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
    /// True only once the interval has closed.
    pub complete: bool,
    /// Enrichment values attached before the candle is published.
    #[serde(default)]
    pub metadata: HashMap<String, f64>,
}

/// An event flowing through the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Order-state update.
    Order(OrderEvent),
    /// Candle update.
    Candle(CandleEvent),
}

impl Event {
    /// Fan-out key of this event.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        match self {
            Self::Order(o) => &o.symbol,
            Self::Candle(c) => &c.symbol,
        }
    }

    /// The order update, if this is one.
    #[must_use]
    pub const fn as_order(&self) -> Option<&OrderEvent> {
        match self {
            Self::Order(o) => Some(o),
            Self::Candle(_) => None,
        }
    }

    /// The candle update, if this is one.
    #[must_use]
    pub const fn as_candle(&self) -> Option<&CandleEvent> {
        match self {
            Self::Candle(c) => Some(c),
            Self::Order(_) => None,
        }
    }

    /// True for order updates whose status is still `NEW`.
    #[must_use]
    pub fn is_new_order(&self) -> bool {
        matches!(self, Self::Order(o) if o.status == OrderStatus::New)
    }
}

impl From<OrderEvent> for Event {
    fn from(o: OrderEvent) -> Self {
        Self::Order(o)
    }
}

impl From<CandleEvent> for Event {
    fn from(c: CandleEvent) -> Self {
        Self::Candle(c)
    }
}
