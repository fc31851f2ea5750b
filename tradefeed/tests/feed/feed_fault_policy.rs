use std::sync::Arc;

use tradefeed::{ConsumerFaultPolicy, EventFeed, FeedConfig, FeedError};

use crate::helpers::{BTCUSDT, ETHUSDT, ErrorLog, Journal, failing, new_order, panicking, recording};

fn feed_with(policy: ConsumerFaultPolicy, errors: &ErrorLog) -> EventFeed {
    let config = FeedConfig {
        consumer_fault: policy,
        ..FeedConfig::default()
    };
    EventFeed::with_config(&config).with_observer(errors.observer())
}

#[tokio::test]
async fn isolate_keeps_delivering_after_consumer_error() {
    let journal = Journal::new();
    let errors = ErrorLog::new();
    let mut feed = feed_with(ConsumerFaultPolicy::Isolate, &errors);
    feed.subscribe(BTCUSDT, failing("flaky", &journal), false).unwrap();
    feed.subscribe(BTCUSDT, recording("steady", &journal), false).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    for id in 1..=3 {
        feed.publish(new_order(BTCUSDT, id)).await;
    }
    feed.shutdown().await;

    assert_eq!(journal.order_ids("flaky"), vec![1, 2, 3]);
    assert_eq!(journal.order_ids("steady"), vec![1, 2, 3]);
    let reported = errors.entries();
    assert_eq!(reported.len(), 3);
    assert!(reported.iter().all(|(source, _)| source == "flaky"));
}

#[tokio::test]
async fn isolate_survives_a_panicking_consumer() {
    let journal = Journal::new();
    let errors = ErrorLog::new();
    let mut feed = feed_with(ConsumerFaultPolicy::Isolate, &errors);
    feed.subscribe(BTCUSDT, panicking("boom"), false).unwrap();
    feed.subscribe(BTCUSDT, recording("steady", &journal), false).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    feed.publish(new_order(BTCUSDT, 1)).await;
    feed.publish(new_order(BTCUSDT, 2)).await;
    feed.shutdown().await;

    assert_eq!(journal.order_ids("steady"), vec![1, 2]);
    let reported = errors.entries();
    assert_eq!(reported.len(), 2);
    assert!(matches!(
        &reported[0].1,
        FeedError::Consumer { consumer, msg } if consumer == "boom" && msg.contains("consumer blew up")
    ));
}

#[tokio::test]
async fn abort_stops_the_faulting_symbol_only() {
    let journal = Journal::new();
    let errors = ErrorLog::new();
    let mut feed = feed_with(ConsumerFaultPolicy::Abort, &errors);
    feed.subscribe(BTCUSDT, failing("flaky", &journal), false).unwrap();
    feed.subscribe(BTCUSDT, recording("after-flaky", &journal), false).unwrap();
    feed.subscribe(ETHUSDT, recording("eth", &journal), false).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    feed.publish(new_order(BTCUSDT, 1)).await;
    feed.publish(new_order(ETHUSDT, 10)).await;
    feed.publish(new_order(ETHUSDT, 11)).await;
    feed.shutdown().await;

    // The first fault ends delivery of that event and the symbol's dispatch.
    assert_eq!(journal.order_ids("flaky"), vec![1]);
    assert!(journal.order_ids("after-flaky").is_empty());
    assert_eq!(journal.order_ids("eth"), vec![10, 11]);
    assert_eq!(errors.entries().len(), 1);
}

#[tokio::test]
async fn abort_drops_publishes_after_the_dispatch_ended() {
    let journal = Journal::new();
    let errors = ErrorLog::new();
    let mut feed = feed_with(ConsumerFaultPolicy::Abort, &errors);
    feed.subscribe(BTCUSDT, failing("flaky", &journal), false).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    feed.publish(new_order(BTCUSDT, 1)).await;
    // Let the dispatch task take the event, fail, and exit.
    while errors.entries().is_empty() {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(!feed.publish(new_order(BTCUSDT, 2)).await);
    feed.shutdown().await;
    assert_eq!(journal.order_ids("flaky"), vec![1]);
}

#[tokio::test]
async fn panicking_observer_ends_only_its_symbol_and_shutdown_completes() {
    let journal = Journal::new();
    let config = FeedConfig {
        consumer_fault: ConsumerFaultPolicy::Isolate,
        ..FeedConfig::default()
    };
    let observer: Arc<dyn tradefeed::ErrorObserver> =
        Arc::new(|_source: &str, _error: &FeedError| panic!("observer blew up"));
    let mut feed = EventFeed::with_config(&config).with_observer(observer);
    feed.subscribe(BTCUSDT, failing("flaky", &journal), false).unwrap();
    feed.subscribe(ETHUSDT, recording("eth", &journal), false).unwrap();
    let feed = Arc::new(feed);
    feed.start().unwrap();

    assert!(feed.publish(new_order(BTCUSDT, 1)).await);
    // The BTC dispatch task died reporting the fault: nothing accepts this one.
    assert!(!feed.publish(new_order(BTCUSDT, 2)).await);
    assert!(feed.publish(new_order(ETHUSDT, 10)).await);
    feed.shutdown().await;

    assert_eq!(journal.order_ids("flaky"), vec![1]);
    assert_eq!(journal.order_ids("eth"), vec![10]);
}
