use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tradefeed_core::{
    ConnectionConfig, Event, FeedError, MessageDecoder, MetadataFetcher, StreamHandle,
    StreamSource, StreamTarget, Symbol,
};

use crate::feed::EventFeed;
use crate::observer::{ErrorObserver, LogObserver};
use crate::streaming::{ConnectionParams, ConnectionState, StreamConnection, spawn_connection};

struct Link {
    target: StreamTarget,
    handle: StreamHandle,
    state: watch::Receiver<ConnectionState>,
    pump: JoinHandle<()>,
}

/// Wires exchange stream connections into an [`EventFeed`].
///
/// Every watched stream gets its own reconnecting connection and one pump task
/// that republishes decoded events into the feed and reports errors to the
/// [`ErrorObserver`] (default: [`LogObserver`]).
///
/// Behavior and trade-offs:
/// - Publishing waits on the feed, so a slow consumer eventually stalls the stream
///   feeding it. For the account stream this stalls every symbol.
/// - A connection that closed (e.g. after a decode fault) stays closed; build a new
///   controller to reconnect.
/// - Dropping the controller stops its connections; pumps then finish on their own.
pub struct FeedController {
    feed: Arc<EventFeed>,
    source: Arc<dyn StreamSource>,
    decoder: Arc<dyn MessageDecoder>,
    config: ConnectionConfig,
    observer: Arc<dyn ErrorObserver>,
    metadata_fetchers: Vec<Arc<dyn MetadataFetcher>>,
    stop: watch::Receiver<bool>,
    links: Vec<Link>,
}

impl FeedController {
    /// Create a controller with no streams yet.
    ///
    /// Start the feed before events arrive: until then they wait for it, and
    /// [`stop`](Self::stop) drops them.
    #[must_use]
    pub fn new(
        feed: Arc<EventFeed>,
        source: Arc<dyn StreamSource>,
        decoder: Arc<dyn MessageDecoder>,
    ) -> Self {
        // Nothing holds the sender: only `stop()` or a shared signal ends streams.
        let (_, stop) = watch::channel(false);
        Self {
            feed,
            source,
            decoder,
            config: ConnectionConfig::default(),
            observer: Arc::new(LogObserver),
            metadata_fetchers: Vec::new(),
            stop,
            links: Vec::new(),
        }
    }

    /// Open the account stream right away: the usual way to run a feed.
    #[must_use]
    pub fn spawn(
        feed: Arc<EventFeed>,
        source: Arc<dyn StreamSource>,
        decoder: Arc<dyn MessageDecoder>,
        config: ConnectionConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let mut controller = Self::new(feed, source, decoder)
            .with_config(config)
            .with_stop_signal(stop);
        controller.watch_account();
        controller
    }

    /// Backoff, decode policy and capacities for streams opened afterwards.
    #[must_use]
    pub const fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive stream errors here instead of the log.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ErrorObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Add a fetcher run on every complete candle.
    #[must_use]
    pub fn with_metadata_fetcher(mut self, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        self.metadata_fetchers.push(fetcher);
        self
    }

    /// Close every stream once `stop` turns `true`.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = stop;
        self
    }

    /// Stream account-wide order updates into the feed.
    pub fn watch_account(&mut self) {
        self.watch(StreamTarget::Account);
    }

    /// Stream `symbol`'s candles at `interval` into the feed.
    pub fn watch_candles(&mut self, symbol: impl Into<Symbol>, interval: impl Into<String>) {
        self.watch(StreamTarget::candles(symbol, interval));
    }

    fn watch(&mut self, target: StreamTarget) {
        let StreamConnection {
            handle,
            events,
            errors,
            state,
        } = spawn_connection(
            Arc::clone(&self.source),
            Arc::clone(&self.decoder),
            target.clone(),
            ConnectionParams {
                config: self.config,
                metadata_fetchers: self.metadata_fetchers.clone(),
            },
            self.stop.clone(),
        );

        #[cfg(feature = "tracing")]
        tracing::info!(target_stream = %target, "watching stream");

        let pump = tokio::spawn(pump(
            Arc::clone(&self.feed),
            target.to_string(),
            events,
            errors,
            Arc::clone(&self.observer),
        ));
        self.links.push(Link {
            target,
            handle,
            state,
            pump,
        });
    }

    /// Current state of every watched stream, in the order they were added.
    #[must_use]
    pub fn connections(&self) -> Vec<(StreamTarget, ConnectionState)> {
        self.links
            .iter()
            .map(|l| (l.target.clone(), *l.state.borrow()))
            .collect()
    }

    /// Cancel every stream and wait until all events already decoded were published.
    ///
    /// If the feed was never started nothing can accept those events: the pumps
    /// are aborted instead and their pending events dropped.
    pub async fn stop(self) {
        let (handles, pumps): (Vec<_>, Vec<_>) = self
            .links
            .into_iter()
            .map(|l| (l.handle, (l.target, l.pump)))
            .unzip();
        join_all(handles.into_iter().map(StreamHandle::stop)).await;

        let drain = self.feed.is_started();
        for (_target, pump) in pumps {
            if !drain {
                pump.abort();
            }
            match pump.await {
                Err(e) if e.is_cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(target_stream = %_target, "pump aborted on unstarted feed");
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(target_stream = %_target, error = %_e, "pump task failed");
                }
                Ok(()) => {}
            }
        }
    }
}

async fn pump(
    feed: Arc<EventFeed>,
    source: String,
    mut events: mpsc::Receiver<Event>,
    mut errors: mpsc::Receiver<FeedError>,
    observer: Arc<dyn ErrorObserver>,
) {
    let mut errors_open = true;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    feed.publish(event).await;
                }
                None => break,
            },
            error = errors.recv(), if errors_open => match error {
                Some(error) => observer.on_error(&source, &error),
                None => errors_open = false,
            },
        }
    }
    // Both channels close together; report what is still queued.
    while let Some(error) = errors.recv().await {
        observer.on_error(&source, &error);
    }
}
