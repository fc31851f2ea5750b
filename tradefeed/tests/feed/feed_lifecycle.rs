use std::sync::Arc;

use tradefeed::{EventFeed, FeedError, Symbol};

use crate::helpers::{BTCUSDT, ETHUSDT, Journal, new_order, recording};

#[tokio::test]
async fn subscribe_after_start_is_rejected() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("a", &journal), false).unwrap();
    feed.start().unwrap();

    let err = feed
        .subscribe(BTCUSDT, recording("late", &journal), false)
        .unwrap_err();
    assert_eq!(err, FeedError::AlreadyStarted);
    assert_eq!(feed.subscriber_count(&Symbol::new(BTCUSDT)), 1);
    feed.shutdown().await;
}

#[tokio::test]
async fn second_start_spawns_nothing() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("a", &journal), false).unwrap();
    feed.subscribe(ETHUSDT, recording("b", &journal), false).unwrap();

    assert_eq!(feed.start().unwrap(), 2);
    assert_eq!(feed.start().unwrap(), 0);

    feed.publish(new_order(BTCUSDT, 1)).await;
    feed.shutdown().await;
    // One dispatch task per symbol: no duplicate delivery.
    assert_eq!(journal.order_ids("a"), vec![1]);
}

#[tokio::test]
async fn registry_reports_symbols_and_counts() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(ETHUSDT, recording("a", &journal), false).unwrap();
    feed.subscribe(BTCUSDT, recording("b", &journal), true).unwrap();
    feed.subscribe(ETHUSDT, recording("c", &journal), false).unwrap();

    assert_eq!(
        feed.symbols(),
        vec![Symbol::new(BTCUSDT), Symbol::new(ETHUSDT)]
    );
    assert_eq!(feed.subscriber_count(&Symbol::new(ETHUSDT)), 2);
    assert_eq!(feed.subscriber_count(&Symbol::new(BTCUSDT)), 1);
}

#[tokio::test]
async fn event_published_before_start_is_delivered_once_started() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("a", &journal), false).unwrap();
    let feed = Arc::new(feed);

    // The inbound slot holds one event until dispatch runs.
    assert!(feed.publish(new_order(BTCUSDT, 1)).await);
    assert_eq!(journal.len(), 0);

    feed.start().unwrap();
    feed.publish(new_order(BTCUSDT, 2)).await;
    feed.shutdown().await;
    assert_eq!(journal.order_ids("a"), vec![1, 2]);
}

#[tokio::test]
async fn publish_after_shutdown_is_dropped() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("a", &journal), false).unwrap();
    feed.start().unwrap();
    feed.shutdown().await;

    assert!(!feed.publish(new_order(BTCUSDT, 1)).await);
    assert_eq!(journal.len(), 0);
}

#[tokio::test]
async fn slow_consumer_applies_backpressure_to_its_publisher() {
    let journal = Journal::new();
    let mut feed = EventFeed::new();
    feed.subscribe(BTCUSDT, recording("a", &journal), false).unwrap();
    let feed = Arc::new(feed);

    // Not started: one event fits, the second must wait for dispatch.
    assert!(feed.publish(new_order(BTCUSDT, 1)).await);
    let mut blocked = tokio_test::task::spawn(feed.publish(new_order(BTCUSDT, 2)));
    tokio_test::assert_pending!(blocked.poll());

    feed.start().unwrap();
    assert!(blocked.await);
    feed.shutdown().await;
    assert_eq!(journal.order_ids("a"), vec![1, 2]);
}
