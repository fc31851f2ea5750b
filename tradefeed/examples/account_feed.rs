use std::sync::Arc;
use std::time::Duration;

use tradefeed::{
    ConnectionConfig, EventFeed, FeedController, FeedError, FuturesDecoder, StreamTarget,
    consumer_fn,
};
use tradefeed_mock::{AfterScript, ScriptItem, ScriptedSource, SessionScript, fixtures};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,tradefeed=debug
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();

    // A scripted exchange: the first connect fails, then a session delivers a few
    // order updates and drops, and the reconnect stays open.
    let (source, script) = ScriptedSource::new_with_controller();
    let account = StreamTarget::Account;
    script
        .push_script(&account, SessionScript::FailOpen(FeedError::transport("handshake timed out")))
        .await;
    script
        .push_script(
            &account,
            SessionScript::Stream {
                items: vec![
                    ScriptItem::Message(fixtures::new_buy("BTCUSDT", 1, "50000", "1.5")),
                    ScriptItem::Delay(Duration::from_millis(200)),
                    ScriptItem::Message(fixtures::order_update(
                        "BTCUSDT", 1, "BUY", "FILLED", "50000", "1.5",
                    )),
                    ScriptItem::Message(fixtures::new_buy("ETHUSDT", 2, "2500", "4")),
                ],
                then: AfterScript::End,
            },
        )
        .await;

    let mut feed = EventFeed::new();
    feed.subscribe(
        "BTCUSDT",
        consumer_fn("btc-strategy", |e| println!("[btc-strategy] {e:?}")),
        false,
    )?;
    feed.subscribe(
        "BTCUSDT",
        consumer_fn("btc-entries", |e| println!("[btc-entries] {e:?}")),
        true,
    )?;
    feed.subscribe(
        "ETHUSDT",
        consumer_fn("eth-strategy", |e| println!("[eth-strategy] {e:?}")),
        false,
    )?;
    let feed = Arc::new(feed);
    feed.start()?;

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let controller = FeedController::spawn(
        Arc::clone(&feed),
        source,
        Arc::new(FuturesDecoder::new()),
        ConnectionConfig::default(),
        stop_rx,
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    for (target, state) in controller.connections() {
        println!("{target}: {state:?}");
    }

    stop_tx.send_replace(true);
    controller.stop().await;
    feed.shutdown().await;
    println!("feed stopped");

    Ok(())
}
