//! Scripted exchange source for tests and examples.
//!
//! [`ScriptedSource`] implements `StreamSource` by replaying, for every `open`,
//! the next [`SessionScript`] queued for that target. Tests drive and inspect it
//! through the paired [`ScriptController`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use tradefeed_core::{
    FeedError, RawMessage, StreamHandle, StreamSession, StreamSource, StreamTarget,
};

pub mod fixtures;

/// One step of a scripted session.
#[derive(Clone, Debug)]
pub enum ScriptItem {
    /// Deliver a raw message.
    Message(RawMessage),
    /// Deliver an error on the session's error channel.
    Error(FeedError),
    /// Pause before the next step.
    Delay(Duration),
}

/// What a session does after its scripted items ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfterScript {
    /// Close the message channel: the subscription ends.
    End,
    /// Stay open, forwarding messages pushed through the controller, until stopped.
    Hold,
}

/// Behavior of one `open` call.
#[derive(Clone, Debug)]
pub enum SessionScript {
    /// Fail the open call.
    FailOpen(FeedError),
    /// Never return from the open call (a stalled handshake).
    Hang,
    /// Open a session that plays `items` and then follows `then`.
    Stream {
        /// Steps to play, in order.
        items: Vec<ScriptItem>,
        /// Behavior once `items` are exhausted.
        then: AfterScript,
    },
}

impl SessionScript {
    /// A session that delivers `messages` and then ends.
    #[must_use]
    pub fn ending(messages: impl IntoIterator<Item = RawMessage>) -> Self {
        Self::Stream {
            items: messages.into_iter().map(ScriptItem::Message).collect(),
            then: AfterScript::End,
        }
    }

    /// A session that delivers `messages` and then stays open.
    #[must_use]
    pub fn holding(messages: impl IntoIterator<Item = RawMessage>) -> Self {
        Self::Stream {
            items: messages.into_iter().map(ScriptItem::Message).collect(),
            then: AfterScript::Hold,
        }
    }
}

struct ActiveSession {
    kill_switch: Option<oneshot::Sender<()>>,
    manual_tx: mpsc::Sender<RawMessage>,
}

#[derive(Default)]
struct InternalState {
    scripts: HashMap<StreamTarget, VecDeque<SessionScript>>,
    opens: HashMap<StreamTarget, Vec<Instant>>,
    active: HashMap<StreamTarget, ActiveSession>,
    stops: usize,
}

/// Handle used by tests to script and observe a [`ScriptedSource`].
#[derive(Clone)]
pub struct ScriptController {
    state: Arc<Mutex<InternalState>>,
}

impl ScriptController {
    /// Queue the behavior of the next unscripted `open` of `target`.
    ///
    /// Once a target's queue is empty, opens succeed with an idle holding session.
    pub async fn push_script(&self, target: &StreamTarget, script: SessionScript) {
        let mut guard = self.state.lock().await;
        guard
            .scripts
            .entry(target.clone())
            .or_default()
            .push_back(script);
    }

    /// Deliver `message` on the live holding session of `target`.
    ///
    /// Returns `false` if no such session is live.
    pub async fn push_message(&self, target: &StreamTarget, message: RawMessage) -> bool {
        // Clone the sender so the lock is not held across the send.
        let tx = {
            let guard = self.state.lock().await;
            guard.active.get(target).map(|s| s.manual_tx.clone())
        };
        match tx {
            Some(tx) => tx.send(message).await.is_ok(),
            None => false,
        }
    }

    /// End the live session of `target` from the exchange side.
    pub async fn end_session(&self, target: &StreamTarget) {
        let mut guard = self.state.lock().await;
        if let Some(session) = guard.active.get_mut(target)
            && let Some(tx) = session.kill_switch.take()
        {
            let _ = tx.send(());
        }
    }

    /// Instants of every `open` call for `target`, oldest first.
    pub async fn open_times(&self, target: &StreamTarget) -> Vec<Instant> {
        let guard = self.state.lock().await;
        guard.opens.get(target).cloned().unwrap_or_default()
    }

    /// Number of `open` calls for `target`.
    pub async fn open_count(&self, target: &StreamTarget) -> usize {
        self.open_times(target).await.len()
    }

    /// Gaps between consecutive `open` calls for `target`.
    pub async fn open_gaps(&self, target: &StreamTarget) -> Vec<Duration> {
        let times = self.open_times(target).await;
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Sessions stopped through their handle (as opposed to ending on their own).
    pub async fn stop_count(&self) -> usize {
        self.state.lock().await.stops
    }
}

/// `StreamSource` that replays scripted sessions.
pub struct ScriptedSource {
    state: Arc<Mutex<InternalState>>,
}

impl ScriptedSource {
    /// Create a source and the controller that scripts it.
    #[must_use]
    pub fn new_with_controller() -> (Arc<dyn StreamSource>, ScriptController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = ScriptController {
            state: Arc::clone(&state),
        };
        (Arc::new(Self { state }) as Arc<dyn StreamSource>, controller)
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open(&self, target: &StreamTarget) -> Result<StreamSession, FeedError> {
        let script = {
            let mut guard = self.state.lock().await;
            guard
                .opens
                .entry(target.clone())
                .or_default()
                .push(Instant::now());
            guard
                .scripts
                .get_mut(target)
                .and_then(VecDeque::pop_front)
        };

        let (items, then) = match script {
            Some(SessionScript::FailOpen(e)) => return Err(e),
            Some(SessionScript::Hang) => return std::future::pending().await,
            Some(SessionScript::Stream { items, then }) => (items, then),
            None => (Vec::new(), AfterScript::Hold),
        };

        let (msg_tx, messages) = mpsc::channel::<RawMessage>(64);
        let (err_tx, errors) = mpsc::channel::<FeedError>(64);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let (manual_tx, mut manual_rx) = mpsc::channel::<RawMessage>(64);

        {
            let mut guard = self.state.lock().await;
            guard.active.insert(
                target.clone(),
                ActiveSession {
                    kill_switch: Some(kill_tx),
                    manual_tx,
                },
            );
        }

        let state = Arc::clone(&self.state);
        let join = tokio::spawn(async move {
            for item in items {
                let stopped = tokio::select! {
                    biased;
                    _ = &mut stop_rx => true,
                    _ = &mut kill_rx => return,
                    open = play(item, &msg_tx, &err_tx) => {
                        if !open {
                            return;
                        }
                        false
                    }
                };
                if stopped {
                    state.lock().await.stops += 1;
                    return;
                }
            }

            if then == AfterScript::End {
                return;
            }
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        state.lock().await.stops += 1;
                        return;
                    }
                    _ = &mut kill_rx => return,
                    pushed = manual_rx.recv() => match pushed {
                        Some(m) => {
                            if msg_tx.send(m).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    },
                }
            }
        });

        Ok(StreamSession {
            handle: StreamHandle::new(join, stop_tx),
            messages,
            errors,
        })
    }
}

/// Play one item; `false` once the reader side is gone.
async fn play(
    item: ScriptItem,
    msg_tx: &mpsc::Sender<RawMessage>,
    err_tx: &mpsc::Sender<FeedError>,
) -> bool {
    match item {
        ScriptItem::Message(m) => msg_tx.send(m).await.is_ok(),
        ScriptItem::Error(e) => err_tx.send(e).await.is_ok(),
        ScriptItem::Delay(d) => {
            tokio::time::sleep(d).await;
            true
        }
    }
}
