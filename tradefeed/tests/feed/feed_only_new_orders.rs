use std::sync::Arc;

use tradefeed::{EventFeed, OrderStatus};

use crate::helpers::{BTCUSDT, Journal, candle, order, recording};

#[tokio::test]
async fn only_new_subscription_skips_later_order_states() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("entries", &journal), true).unwrap();
    feed.subscribe(BTCUSDT, recording("all", &journal), false).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    feed.publish(order(BTCUSDT, 1, OrderStatus::New)).await;
    feed.publish(order(BTCUSDT, 1, OrderStatus::PartiallyFilled)).await;
    feed.publish(order(BTCUSDT, 1, OrderStatus::Filled)).await;
    feed.publish(order(BTCUSDT, 2, OrderStatus::New)).await;
    feed.publish(order(BTCUSDT, 2, OrderStatus::Canceled)).await;
    feed.shutdown().await;

    assert_eq!(journal.order_ids("entries"), vec![1, 2]);
    assert!(journal.seen_by("entries").iter().all(|e| e.is_new_order()));
    assert_eq!(journal.order_ids("all"), vec![1, 1, 1, 2, 2]);
}

#[tokio::test]
async fn only_new_subscription_still_gets_candles() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("entries", &journal), true).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    feed.publish(candle(BTCUSDT, 0, false)).await;
    feed.publish(order(BTCUSDT, 7, OrderStatus::Expired)).await;
    feed.publish(candle(BTCUSDT, 0, true)).await;
    feed.shutdown().await;

    let seen = journal.seen_by("entries");
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|e| e.as_candle().is_some()));
}
