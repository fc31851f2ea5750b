use std::time::Duration;

use tradefeed_core::{DecodeFaultPolicy, FeedError};

use super::backoff::Backoff;

/// Lifecycle of one reconnecting stream connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the exchange subscription.
    Connecting,
    /// Subscription live; messages are being decoded and forwarded.
    Streaming,
    /// Waiting before the next open attempt.
    Backoff,
    /// Terminal. Output channels are closed.
    Closed,
}

/// Inputs fed to the machine by the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// `StreamSource::open` returned a session.
    OpenSucceeded,
    /// `StreamSource::open` failed.
    OpenFailed(FeedError),
    /// The live subscription reported an error but keeps running.
    StreamError(FeedError),
    /// A message could not be decoded.
    DecodeFailed(FeedError),
    /// The subscription's message sequence ended.
    SessionEnded,
    /// The backoff wait is over.
    BackoffElapsed,
    /// Stop signal, handle stop, or the event reader went away.
    Cancel,
}

/// Effects the driver must perform, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Call `StreamSource::open` for the target.
    Open,
    /// Forward an error on the error channel.
    ReportError(FeedError),
    /// Stop and forget the live session, if any.
    DropSession,
    /// Send `BackoffElapsed` after `delay`.
    ScheduleBackoff {
        /// Wait before the next open attempt, before jitter.
        delay: Duration,
    },
    /// End the driver; its output channels close.
    Close,
}

/// Pure transition logic of a stream connection: signals in, commands out.
#[derive(Debug)]
pub struct ConnectionMachine {
    /// Current state.
    pub state: ConnectionState,
    /// Reconnect delays.
    pub backoff: Backoff,
    /// What a decode fault does.
    pub decode_policy: DecodeFaultPolicy,
    /// Open failures and session ends since the last successful open.
    pub consecutive_failures: u32,
}

impl ConnectionMachine {
    /// A machine about to open its first session.
    #[must_use]
    pub fn new(backoff: Backoff, decode_policy: DecodeFaultPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            backoff,
            decode_policy,
            consecutive_failures: 0,
        }
    }

    /// Commands that kick off the first connection attempt.
    pub fn start(&self) -> Vec<Command> {
        if self.state == ConnectionState::Connecting {
            vec![Command::Open]
        } else {
            Vec::new()
        }
    }

    /// Apply one signal; returns the next machine and the commands to run, in order.
    #[must_use]
    pub fn handle(self, signal: Signal) -> (Self, Vec<Command>) {
        use ConnectionState as S;

        match (self.state, signal) {
            (S::Closed, _) => (self, Vec::new()),
            (_, Signal::Cancel) => (
                Self {
                    state: S::Closed,
                    ..self
                },
                vec![Command::DropSession, Command::Close],
            ),
            (S::Connecting, Signal::OpenSucceeded) => {
                let mut next = Self {
                    state: S::Streaming,
                    consecutive_failures: 0,
                    ..self
                };
                next.backoff.reset();
                (next, Vec::new())
            }
            (S::Connecting, Signal::OpenFailed(error)) => {
                let (next, mut actions) = self.enter_backoff();
                actions.insert(0, Command::ReportError(error));
                (next, actions)
            }
            (S::Streaming, Signal::StreamError(error)) => {
                (self, vec![Command::ReportError(error)])
            }
            (S::Streaming, Signal::DecodeFailed(error)) => match self.decode_policy {
                DecodeFaultPolicy::Skip => (self, vec![Command::ReportError(error)]),
                DecodeFaultPolicy::Reconnect => {
                    let (next, mut actions) = self.enter_backoff();
                    actions.insert(0, Command::DropSession);
                    actions.insert(0, Command::ReportError(error));
                    (next, actions)
                }
                // Close, and any policy added later, is fatal.
                _ => (
                    Self {
                        state: S::Closed,
                        ..self
                    },
                    vec![
                        Command::ReportError(error),
                        Command::DropSession,
                        Command::Close,
                    ],
                ),
            },
            (S::Streaming, Signal::SessionEnded) => {
                let (next, mut actions) = self.enter_backoff();
                actions.insert(0, Command::DropSession);
                (next, actions)
            }
            (S::Backoff, Signal::BackoffElapsed) => (
                Self {
                    state: S::Connecting,
                    ..self
                },
                vec![Command::Open],
            ),
            // Stale signals (e.g. a late stream error while backing off) are ignored.
            (_, _) => (self, Vec::new()),
        }
    }

    fn enter_backoff(mut self) -> (Self, Vec<Command>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.backoff.next();
        (
            Self {
                state: ConnectionState::Backoff,
                ..self
            },
            vec![Command::ScheduleBackoff { delay }],
        )
    }

    /// True once the connection is terminal.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }
}
