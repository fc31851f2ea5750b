use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tradefeed_core::{ConsumerFaultPolicy, Event, FeedConfig, FeedConsumer, FeedError, Symbol};

use crate::observer::{ErrorObserver, LogObserver};

struct Subscription {
    consumer: Arc<dyn FeedConsumer>,
    only_new_orders: bool,
}

impl Subscription {
    fn wants(&self, event: &Event) -> bool {
        !self.only_new_orders || event.as_order().is_none() || event.is_new_order()
    }
}

/// Dispatch-side half of a symbol's inbound channel, waiting for `start`.
struct PendingRoute {
    inbound: mpsc::Receiver<Event>,
    subscriptions: Vec<Subscription>,
}

/// Per-symbol publish/subscribe dispatcher.
///
/// Lifecycle: register consumers with [`subscribe`](Self::subscribe), then call
/// [`start`](Self::start) once. After that the registry is frozen: events can be
/// published from any number of tasks (share the feed in an `Arc`).
///
/// Behavior and trade-offs:
/// - One dispatch task per symbol delivers each event to every subscriber of that
///   symbol, in registration order, before taking the next event. Symbols never
///   block each other.
/// - Each symbol's inbound channel holds a single event, so a slow consumer stalls
///   publishers of its symbol instead of growing an unbounded queue.
/// - Events for symbols nobody subscribed to are dropped.
/// - Consumer errors and panics are handled per [`ConsumerFaultPolicy`].
pub struct EventFeed {
    consumer_fault: ConsumerFaultPolicy,
    observer: Arc<dyn ErrorObserver>,
    inbound: HashMap<Symbol, mpsc::Sender<Event>>,
    subscriber_counts: HashMap<Symbol, usize>,
    // Taken by `start`; `None` once dispatch is running.
    pending: Mutex<Option<HashMap<Symbol, PendingRoute>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed {
    /// Create an empty feed with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&FeedConfig::default())
    }

    /// Create an empty feed using the dispatch settings from `config`.
    #[must_use]
    pub fn with_config(config: &FeedConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            consumer_fault: config.consumer_fault,
            observer: Arc::new(LogObserver),
            inbound: HashMap::new(),
            subscriber_counts: HashMap::new(),
            pending: Mutex::new(Some(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Report consumer faults to `observer` instead of the log.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ErrorObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Register `consumer` for events of `symbol`.
    ///
    /// With `only_new_orders` the consumer receives order updates only while their
    /// status is `NEW`; candle events are always delivered.
    ///
    /// # Errors
    /// Returns `FeedError::AlreadyStarted` once [`start`](Self::start) has run.
    pub fn subscribe(
        &mut self,
        symbol: impl Into<Symbol>,
        consumer: Arc<dyn FeedConsumer>,
        only_new_orders: bool,
    ) -> Result<(), FeedError> {
        let symbol = symbol.into();
        let pending = self
            .pending
            .get_mut()
            .map_err(|_| FeedError::Other("feed registry poisoned".into()))?;
        let Some(pending) = pending.as_mut() else {
            return Err(FeedError::AlreadyStarted);
        };

        let route = pending.entry(symbol.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(1);
            self.inbound.insert(symbol.clone(), tx);
            PendingRoute {
                inbound: rx,
                subscriptions: Vec::new(),
            }
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            symbol = %symbol,
            consumer = consumer.name(),
            only_new_orders,
            "consumer subscribed"
        );
        route.subscriptions.push(Subscription {
            consumer,
            only_new_orders,
        });
        *self.subscriber_counts.entry(symbol).or_default() += 1;
        Ok(())
    }

    /// Hand `event` to its symbol's dispatch task.
    ///
    /// Waits until the dispatch task has room for it. Returns `false` when the
    /// event was dropped: no subscriber for the symbol, or its dispatch task has
    /// ended (shutdown, or an aborting consumer fault).
    pub async fn publish(&self, event: Event) -> bool {
        let Some(tx) = self.inbound.get(event.symbol()) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(symbol = %event.symbol(), "no subscribers; event dropped");
            return false;
        };
        match tx.send(event).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(_event)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(symbol = %_event.symbol(), "dispatch ended; event dropped");
                false
            }
        }
    }

    /// Spawn one dispatch task per registered symbol.
    ///
    /// Returns how many tasks were spawned; a second call spawns nothing and returns 0.
    ///
    /// # Errors
    /// Returns `FeedError::Other` if the registry lock was poisoned.
    pub fn start(&self) -> Result<usize, FeedError> {
        let routes = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| FeedError::Other("feed registry poisoned".into()))?;
            match pending.take() {
                Some(routes) => routes,
                None => return Ok(0),
            }
        };

        let spawned: Vec<JoinHandle<()>> = routes
            .into_iter()
            .map(|(symbol, route)| {
                tokio::spawn(dispatch_loop(
                    symbol,
                    route,
                    self.consumer_fault,
                    Arc::clone(&self.observer),
                    self.shutdown.subscribe(),
                ))
            })
            .collect();
        let count = spawned.len();

        #[cfg(feature = "tracing")]
        tracing::info!(symbols = count, policy = ?self.consumer_fault, "event feed started");

        self.tasks
            .lock()
            .map_err(|_| FeedError::Other("feed task list poisoned".into()))?
            .extend(spawned);
        Ok(count)
    }

    /// Close every inbound channel and wait for the dispatch tasks to finish.
    ///
    /// Events already accepted by a dispatch task are still delivered; later
    /// publishes are dropped.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for result in join_all(tasks).await {
            if let Err(_e) = result {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "dispatch task failed");
            }
        }
        #[cfg(feature = "tracing")]
        tracing::info!("event feed shut down");
    }

    /// True once [`start`](Self::start) has run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.pending.lock().map_or(true, |pending| pending.is_none())
    }

    /// Symbols with at least one subscriber, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.inbound.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Number of consumers registered for `symbol`.
    #[must_use]
    pub fn subscriber_count(&self, symbol: &Symbol) -> usize {
        self.subscriber_counts.get(symbol).copied().unwrap_or(0)
    }
}

async fn dispatch_loop(
    symbol: Symbol,
    route: PendingRoute,
    policy: ConsumerFaultPolicy,
    observer: Arc<dyn ErrorObserver>,
    mut shutdown: watch::Receiver<bool>,
) {
    let PendingRoute {
        mut inbound,
        subscriptions,
    } = route;

    loop {
        tokio::select! {
            biased;
            stopped = shutdown_requested(&mut shutdown) => {
                if stopped {
                    inbound.close();
                }
                // Deliver what was already accepted, then stop.
                while let Some(event) = inbound.recv().await {
                    if !deliver(&event, &subscriptions, policy, observer.as_ref()) {
                        break;
                    }
                }
                break;
            }
            event = inbound.recv() => match event {
                Some(event) => {
                    if !deliver(&event, &subscriptions, policy, observer.as_ref()) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(symbol = %symbol, "dispatch aborted after consumer fault");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(symbol = %symbol, "dispatch loop ended");
    #[cfg(not(feature = "tracing"))]
    let _ = symbol;
}

/// True once shutdown was requested, false if the feed itself is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) -> bool {
    shutdown.wait_for(|stop| *stop).await.is_ok()
}

/// Deliver one event to every interested subscriber. Returns `false` when the
/// dispatch task must stop.
fn deliver(
    event: &Event,
    subscriptions: &[Subscription],
    policy: ConsumerFaultPolicy,
    observer: &dyn ErrorObserver,
) -> bool {
    for sub in subscriptions.iter().filter(|s| s.wants(event)) {
        let Err(error) = invoke(sub.consumer.as_ref(), event) else {
            continue;
        };
        observer.on_error(sub.consumer.name(), &error);
        if policy == ConsumerFaultPolicy::Abort {
            return false;
        }
    }
    true
}

fn invoke(consumer: &dyn FeedConsumer, event: &Event) -> Result<(), FeedError> {
    match catch_unwind(AssertUnwindSafe(|| consumer.on_event(event))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "consumer panicked".to_string());
            Err(FeedError::consumer(consumer.name(), format!("panic: {msg}")))
        }
    }
}
