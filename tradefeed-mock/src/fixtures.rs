//! Raw payloads in the futures websocket wire format.

use serde_json::json;
use tradefeed_core::RawMessage;

/// Fixed trade time used by the fixtures: 2024-01-01T00:00:00Z.
pub const TRADE_TIME_MS: i64 = 1_704_067_200_000;

/// An `ORDER_TRADE_UPDATE` account message.
///
/// `price` and `quantity` are sent as strings, like the exchange does; pass an
/// unparsable string to provoke a decode fault.
#[must_use]
pub fn order_update(
    symbol: &str,
    order_id: i64,
    side: &str,
    status: &str,
    price: &str,
    quantity: &str,
) -> RawMessage {
    RawMessage::new(json!({
        "e": "ORDER_TRADE_UPDATE",
        "E": TRADE_TIME_MS + 5,
        "T": TRADE_TIME_MS,
        "o": {
            "s": symbol,
            "c": format!("client-{order_id}"),
            "S": side,
            "o": "LIMIT",
            "f": "GTC",
            "q": quantity,
            "p": price,
            "ap": price,
            "x": "NEW",
            "X": status,
            "i": order_id,
            "l": "0",
            "z": quantity,
            "T": TRADE_TIME_MS,
        }
    }))
}

/// A `NEW` limit buy at `price` × `quantity`.
#[must_use]
pub fn new_buy(symbol: &str, order_id: i64, price: &str, quantity: &str) -> RawMessage {
    order_update(symbol, order_id, "BUY", "NEW", price, quantity)
}

/// A `kline` candle message on the 1m interval; high is `close` and low is `open`.
#[must_use]
pub fn kline(symbol: &str, open: &str, close: &str, complete: bool) -> RawMessage {
    RawMessage::new(json!({
        "e": "kline",
        "E": TRADE_TIME_MS + 59_999,
        "s": symbol,
        "k": {
            "t": TRADE_TIME_MS,
            "T": TRADE_TIME_MS + 59_999,
            "s": symbol,
            "i": "1m",
            "o": open,
            "c": close,
            "h": close,
            "l": open,
            "v": "12.5",
            "x": complete,
        }
    }))
}

/// An account message the feed has no use for.
#[must_use]
pub fn account_update() -> RawMessage {
    RawMessage::new(json!({
        "e": "ACCOUNT_UPDATE",
        "E": TRADE_TIME_MS,
        "a": { "m": "ORDER", "B": [], "P": [] }
    }))
}
