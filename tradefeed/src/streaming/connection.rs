use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tradefeed_core::{
    ConnectionConfig, Event, FeedError, MessageDecoder, MetadataFetcher, StreamHandle,
    StreamSource, StreamTarget,
};

use super::backoff::{Backoff, jittered};
use super::connection_sm::{Command, ConnectionMachine, ConnectionState, Signal};
use super::session::{LiveSession, SessionItem, enrich, next_item};

/// Settings for [`spawn_connection`].
#[derive(Clone, Default)]
pub struct ConnectionParams {
    /// Backoff, decode policy and channel capacities.
    pub config: ConnectionConfig,
    /// Run on every complete candle before it is forwarded.
    pub metadata_fetchers: Vec<Arc<dyn MetadataFetcher>>,
}

/// Outputs of a running stream connection.
///
/// `events` and `errors` are closed exactly once, when the connection reaches
/// [`ConnectionState::Closed`].
pub struct StreamConnection {
    /// Stops the connection; dropping it stops the connection too.
    pub handle: StreamHandle,
    /// Decoded events, in the order the exchange sent them.
    pub events: mpsc::Receiver<Event>,
    /// Open failures, subscription errors and decode faults.
    pub errors: mpsc::Receiver<FeedError>,
    /// Current lifecycle state.
    pub state: watch::Receiver<ConnectionState>,
}

/// Open `target` on `source` and keep it open until cancelled.
///
/// Behavior and trade-offs:
/// - Open failures and subscription ends are retried after an exponential
///   backoff (`config.backoff`); the delay resets after every successful open.
/// - Subscription errors are forwarded on `errors` without interrupting the session.
/// - Decode faults follow `config.decode_fault`: close (default), reconnect, or skip.
/// - Cancellation comes from `stop` turning `true` (shared by many connections),
///   from stopping or dropping the returned handle, or from dropping `events`.
///   It is checked before every other input, so nothing is forwarded after it.
/// - `events` has `config.event_capacity` slots; a slow reader stalls decoding,
///   which is the feed's backpressure.
pub fn spawn_connection(
    source: Arc<dyn StreamSource>,
    decoder: Arc<dyn MessageDecoder>,
    target: StreamTarget,
    params: ConnectionParams,
    stop: watch::Receiver<bool>,
) -> StreamConnection {
    let ConnectionParams {
        config,
        metadata_fetchers,
    } = params;

    let (event_tx, events) = mpsc::channel(config.event_capacity.max(1));
    let (error_tx, errors) = mpsc::channel(config.error_capacity.max(1));
    let (state_tx, state) = watch::channel(ConnectionState::Connecting);
    let (stop_tx, stop_rx) = oneshot::channel();

    let machine =
        ConnectionMachine::new(Backoff::from_config(&config.backoff), config.decode_fault);
    let driver = Driver {
        source,
        decoder,
        target,
        metadata_fetchers,
        jitter_percent: config.backoff.jitter_percent,
        event_tx,
        error_tx: Some(error_tx),
        state_tx,
        cancel: Cancellation {
            stop,
            stop_rx,
            requested: false,
        },
        session: None,
        backoff_timer: None,
    };
    let join = tokio::spawn(driver.run(machine));

    StreamConnection {
        handle: StreamHandle::new(join, stop_tx),
        events,
        errors,
        state,
    }
}

struct Cancellation {
    stop: watch::Receiver<bool>,
    stop_rx: oneshot::Receiver<()>,
    // Latched on the first resolution; `stop_rx` must not be polled again after it.
    requested: bool,
}

impl Cancellation {
    /// Resolves once cancellation was requested through either path, and
    /// immediately on every later call.
    async fn cancelled(&mut self) {
        if self.requested {
            return;
        }
        tokio::select! {
            () = wait_for_stop(&mut self.stop) => {}
            _ = &mut self.stop_rx => {}
        }
        self.requested = true;
    }
}

async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    let sender_gone = stop.wait_for(|stopped| *stopped).await.is_err();
    // A dropped sender can no longer cancel anything.
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

async fn sleep_or_pending(timer: Option<&mut Pin<Box<tokio::time::Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => std::future::pending().await,
    }
}

struct Driver {
    source: Arc<dyn StreamSource>,
    decoder: Arc<dyn MessageDecoder>,
    target: StreamTarget,
    metadata_fetchers: Vec<Arc<dyn MetadataFetcher>>,
    jitter_percent: u8,
    event_tx: mpsc::Sender<Event>,
    // None once the error reader is gone; errors are then only logged.
    error_tx: Option<mpsc::Sender<FeedError>>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: Cancellation,
    session: Option<LiveSession>,
    backoff_timer: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl Driver {
    async fn run(mut self, mut machine: ConnectionMachine) {
        let mut queue: VecDeque<Command> = machine.start().into();

        loop {
            while let Some(command) = queue.pop_front() {
                let follow_up = match command {
                    Command::Open => Some(self.open().await),
                    Command::ReportError(error) => self.report(error).await,
                    Command::DropSession => {
                        if let Some(session) = self.session.take() {
                            session.stop().await;
                        }
                        None
                    }
                    Command::ScheduleBackoff { delay } => {
                        self.arm_backoff(delay, machine.consecutive_failures);
                        None
                    }
                    Command::Close => {
                        #[cfg(feature = "tracing")]
                        tracing::info!(target_stream = %self.target, "stream connection closed");
                        // Dropping the driver drops the only senders: both outputs close here.
                        return;
                    }
                };

                if let Some(signal) = follow_up {
                    let was_closed = machine.is_closed();
                    let (next, commands) = machine.handle(signal);
                    machine = next;
                    self.state_tx.send_replace(machine.state);
                    // Entering Closed supersedes the rest of the queue; once closed,
                    // the queued DropSession and Close must still run.
                    if machine.is_closed() && !was_closed {
                        queue.clear();
                    }
                    queue.extend(commands);
                }
            }

            if machine.is_closed() {
                if let Some(session) = self.session.take() {
                    session.stop().await;
                }
                return;
            }

            let signal = self.next_signal().await;
            let (next, commands) = machine.handle(signal);
            machine = next;
            self.state_tx.send_replace(machine.state);
            queue.extend(commands);
        }
    }

    async fn open(&mut self) -> Signal {
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Signal::Cancel,
            res = self.source.open(&self.target) => res,
        };
        match result {
            Ok(session) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    source = self.source.name(),
                    target_stream = %self.target,
                    "stream connected"
                );
                self.session = Some(LiveSession::from(session));
                Signal::OpenSucceeded
            }
            Err(error) => Signal::OpenFailed(error),
        }
    }

    async fn report(&mut self, error: FeedError) -> Option<Signal> {
        #[cfg(feature = "tracing")]
        tracing::warn!(target_stream = %self.target, error = %error, "stream error");

        let tx = self.error_tx.clone()?;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Some(Signal::Cancel),
            res = tx.send(error) => {
                if res.is_err() {
                    self.error_tx = None;
                }
                None
            }
        }
    }

    fn arm_backoff(&mut self, delay: Duration, failures: u32) {
        let wait = jittered(delay, self.jitter_percent);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            target_stream = %self.target,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            failures,
            "reconnecting after backoff"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = failures;
        self.backoff_timer = Some(Box::pin(tokio::time::sleep(wait)));
    }

    async fn next_signal(&mut self) -> Signal {
        loop {
            let item = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Signal::Cancel,
                () = self.event_tx.closed() => return Signal::Cancel,
                () = sleep_or_pending(self.backoff_timer.as_mut()) => {
                    self.backoff_timer = None;
                    return Signal::BackoffElapsed;
                }
                item = next_item(self.session.as_mut()) => item,
            };

            match item {
                SessionItem::Message(raw) => match self.decoder.decode(&self.target, raw) {
                    Ok(Some(mut event)) => {
                        enrich(&mut event, &self.metadata_fetchers);
                        if let Some(signal) = self.forward(event).await {
                            return signal;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => return Signal::DecodeFailed(error),
                },
                SessionItem::Error(error) => return Signal::StreamError(error),
                SessionItem::Ended => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(target_stream = %self.target, "stream ended by exchange");
                    return Signal::SessionEnded;
                }
            }
        }
    }

    async fn forward(&mut self, event: Event) -> Option<Signal> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Some(Signal::Cancel),
            res = self.event_tx.send(event) => {
                // Nobody reads events any more: nothing left to stream for.
                res.is_err().then_some(Signal::Cancel)
            }
        }
    }
}
