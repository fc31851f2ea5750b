//! Decoder for the futures websocket wire format.
//!
//! Two event shapes are understood:
//! - `kline` events on candle streams, with OHLCV encoded as decimal strings;
//! - `ORDER_TRADE_UPDATE` events on the account stream, whose average price and
//!   accumulated filled quantity are decimal strings as well.
//!
//! Any other event type is well-formed but irrelevant to the feed and decodes to
//! `None`. Numeric fields that fail to parse are reported as `FeedError::Decode`
//! naming the wire field.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::connector::{MessageDecoder, RawMessage, StreamTarget};
use crate::types::{CandleEvent, Event, FeedError, OrderEvent, OrderStatus, OrderType, Side, Symbol};

const KLINE_EVENT: &str = "kline";
const ORDER_TRADE_UPDATE_EVENT: &str = "ORDER_TRADE_UPDATE";

#[derive(Debug, Deserialize)]
struct WsKlineEvent {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    #[serde(rename = "k")]
    kline: WsKline,
}

#[derive(Debug, Deserialize)]
struct WsKline {
    #[serde(rename = "t")]
    start_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
struct WsOrderTradeUpdateEvent {
    #[serde(rename = "o")]
    order: WsOrderTradeUpdate,
}

#[derive(Debug, Deserialize)]
struct WsOrderTradeUpdate {
    #[serde(rename = "i")]
    id: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "o")]
    order_type: String,
    #[serde(rename = "X")]
    status: String,
    #[serde(rename = "ap")]
    average_price: String,
    #[serde(rename = "z")]
    accumulated_filled_qty: String,
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Decoder for the exchange's futures websocket payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuturesDecoder;

impl FuturesDecoder {
    /// Create a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn decode_kline(payload: serde_json::Value) -> Result<Event, FeedError> {
        let ev: WsKlineEvent =
            serde_json::from_value(payload).map_err(|e| FeedError::decode("k", e.to_string()))?;
        let k = ev.kline;
        let time = millis_to_utc("k.t", k.start_time)?;
        let updated_at = match ev.event_time {
            Some(ms) => millis_to_utc("E", ms)?,
            None => time,
        };
        Ok(Event::Candle(CandleEvent {
            symbol: Symbol::new(k.symbol),
            time,
            updated_at,
            open: parse_decimal("k.o", &k.open)?,
            high: parse_decimal("k.h", &k.high)?,
            low: parse_decimal("k.l", &k.low)?,
            close: parse_decimal("k.c", &k.close)?,
            volume: parse_decimal("k.v", &k.volume)?,
            complete: k.is_final,
            metadata: HashMap::new(),
        }))
    }

    fn decode_order_update(payload: serde_json::Value) -> Result<Event, FeedError> {
        let ev: WsOrderTradeUpdateEvent =
            serde_json::from_value(payload).map_err(|e| FeedError::decode("o", e.to_string()))?;
        let o = ev.order;
        let side = match o.side.as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => return Err(FeedError::decode("o.S", format!("unknown side {other:?}"))),
        };
        let ts = millis_to_utc("o.T", o.trade_time)?;
        Ok(Event::Order(OrderEvent {
            exchange_id: o.id,
            symbol: Symbol::new(o.symbol),
            side,
            order_type: OrderType::from(o.order_type),
            status: OrderStatus::from(o.status),
            price: parse_decimal("o.ap", &o.average_price)?,
            quantity: parse_decimal("o.z", &o.accumulated_filled_qty)?,
            created_at: ts,
            updated_at: ts,
        }))
    }
}

impl MessageDecoder for FuturesDecoder {
    fn decode(&self, target: &StreamTarget, raw: RawMessage) -> Result<Option<Event>, FeedError> {
        let kind = raw
            .payload
            .get("e")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| FeedError::decode("e", "missing event type"))?;

        match (target, kind.as_str()) {
            (StreamTarget::Candles { .. }, KLINE_EVENT) => Self::decode_kline(raw.payload).map(Some),
            (StreamTarget::Account, ORDER_TRADE_UPDATE_EVENT) => {
                Self::decode_order_update(raw.payload).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| FeedError::decode(field, format!("{value:?}: {e}")))
}

fn millis_to_utc(field: &str, ms: i64) -> Result<DateTime<Utc>, FeedError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| FeedError::decode(field, format!("timestamp out of range: {ms}")))
}
