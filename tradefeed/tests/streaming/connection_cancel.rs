use std::time::Duration;

use tradefeed::{ConnectionConfig, ConnectionState, FeedError, StreamTarget};
use tradefeed_mock::{ScriptedSource, SessionScript, fixtures};

use crate::helpers::{BTCUSDT, ETHUSDT, connect};

#[tokio::test(start_paused = true)]
async fn stop_signal_while_streaming_closes_both_channels_once() {
    let (source, ctl) = ScriptedSource::new_with_controller();
    let target = StreamTarget::Account;
    ctl.push_script(
        &target,
        SessionScript::holding([fixtures::new_buy(BTCUSDT, 1, "50000", "1.5")]),
    )
    .await;

    let (stop, mut conn) = connect(source, target.clone(), ConnectionConfig::default());
    assert!(conn.events.recv().await.is_some());

    stop.send_replace(true);
    // Cancelling twice is harmless.
    stop.send_replace(true);

    assert!(conn.events.recv().await.is_none());
    assert!(conn.errors.recv().await.is_none());
    assert_eq!(*conn.state.borrow(), ConnectionState::Closed);

    // Closed for good: nothing was reopened and the vendor session was stopped.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctl.open_count(&target).await, 1);
    assert_eq!(ctl.stop_count().await, 1);
    assert!(!ctl.push_message(&target, fixtures::new_buy(BTCUSDT, 2, "1", "1")).await);
    assert!(conn.handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn handle_stop_during_backoff_closes_immediately() {
    let (source, ctl) = ScriptedSource::new_with_controller();
    let target = StreamTarget::Account;
    ctl.push_script(&target, SessionScript::FailOpen(FeedError::transport("refused")))
        .await;

    let (_stop, mut conn) = connect(source, target.clone(), ConnectionConfig::default());
    assert!(conn.errors.recv().await.is_some());
    conn.state
        .wait_for(|s| *s == ConnectionState::Backoff)
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    conn.handle.stop().await;
    // No need to sit out the 100ms wait.
    assert!(started.elapsed() < Duration::from_millis(100));

    assert!(conn.events.recv().await.is_none());
    assert!(conn.errors.recv().await.is_none());
    assert_eq!(*conn.state.borrow(), ConnectionState::Closed);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ctl.open_count(&target).await, 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_a_stalled_open() {
    let (source, ctl) = ScriptedSource::new_with_controller();
    let target = StreamTarget::Account;
    ctl.push_script(&target, SessionScript::Hang).await;

    let (stop, mut conn) = connect(source, target.clone(), ConnectionConfig::default());
    while ctl.open_count(&target).await == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(*conn.state.borrow(), ConnectionState::Connecting);

    stop.send_replace(true);
    assert!(conn.events.recv().await.is_none());
    assert_eq!(*conn.state.borrow(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn one_stop_signal_closes_every_connection_sharing_it() {
    let (source, ctl) = ScriptedSource::new_with_controller();
    let btc = StreamTarget::candles(BTCUSDT, "1m");
    let eth = StreamTarget::candles(ETHUSDT, "1m");
    for _ in 0..20 {
        ctl.push_script(&eth, SessionScript::FailOpen(FeedError::transport("down")))
            .await;
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let spawn = |target: StreamTarget| {
        tradefeed::spawn_connection(
            source.clone(),
            std::sync::Arc::new(tradefeed::FuturesDecoder::new()),
            target,
            tradefeed::ConnectionParams::default(),
            stop_rx.clone(),
        )
    };
    let mut a = spawn(btc.clone());
    let mut b = spawn(eth.clone());

    // One streaming, one backing off.
    a.state.wait_for(|s| *s == ConnectionState::Streaming).await.unwrap();
    b.state.wait_for(|s| *s == ConnectionState::Backoff).await.unwrap();

    stop_tx.send_replace(true);
    assert!(a.events.recv().await.is_none());
    assert!(b.events.recv().await.is_none());
    assert_eq!(*a.state.borrow(), ConnectionState::Closed);
    assert_eq!(*b.state.borrow(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_event_reader_cancels_the_connection() {
    let (source, ctl) = ScriptedSource::new_with_controller();
    let target = StreamTarget::Account;
    ctl.push_script(&target, SessionScript::holding([])).await;

    let (_stop, conn) = connect(source, target.clone(), ConnectionConfig::default());
    let tradefeed::StreamConnection {
        handle,
        events,
        mut state,
        ..
    } = conn;
    state.wait_for(|s| *s == ConnectionState::Streaming).await.unwrap();

    drop(events);
    state.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();
    handle.stop().await;
    assert_eq!(ctl.stop_count().await, 1);
}
