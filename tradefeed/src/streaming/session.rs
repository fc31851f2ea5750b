use std::sync::Arc;

use tokio::sync::mpsc;
use tradefeed_core::{Event, FeedError, MetadataFetcher, RawMessage, StreamHandle, StreamSession};

/// What the live subscription produced next.
pub(crate) enum SessionItem {
    Message(RawMessage),
    Error(FeedError),
    Ended,
}

enum Polled {
    Message(Option<RawMessage>),
    Error(Option<FeedError>),
}

/// A live vendor subscription owned by exactly one connection.
pub(crate) struct LiveSession {
    handle: Option<StreamHandle>,
    messages: mpsc::Receiver<RawMessage>,
    // None once the vendor closed its error side; messages may still flow.
    errors: Option<mpsc::Receiver<FeedError>>,
}

impl From<StreamSession> for LiveSession {
    fn from(s: StreamSession) -> Self {
        Self {
            handle: Some(s.handle),
            messages: s.messages,
            errors: Some(s.errors),
        }
    }
}

impl LiveSession {
    pub(crate) async fn next(&mut self) -> SessionItem {
        loop {
            let polled = tokio::select! {
                biased;
                m = self.messages.recv() => Polled::Message(m),
                e = recv_or_pending(self.errors.as_mut()) => Polled::Error(e),
            };
            match polled {
                Polled::Message(Some(raw)) => return SessionItem::Message(raw),
                Polled::Message(None) => {
                    // Errors raised just before the end are still reported.
                    if let Some(err) = self.errors.as_mut().and_then(|rx| rx.try_recv().ok()) {
                        return SessionItem::Error(err);
                    }
                    return SessionItem::Ended;
                }
                Polled::Error(Some(err)) => return SessionItem::Error(err),
                Polled::Error(None) => self.errors = None,
            }
        }
    }

    pub(crate) async fn stop(mut self) {
        if let Some(h) = self.handle.take() {
            h.stop().await;
        }
    }
}

async fn recv_or_pending<T>(rx: Option<&mut mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Attach metadata to complete candles; every other event passes through untouched.
pub(crate) fn enrich(event: &mut Event, fetchers: &[Arc<dyn MetadataFetcher>]) {
    if let Event::Candle(candle) = event
        && candle.complete
    {
        for fetcher in fetchers {
            let (key, value) = fetcher.fetch(&candle.symbol, candle.time);
            candle.metadata.insert(key, value);
        }
    }
}

/// Pending-forever helper for "no session" states.
pub(crate) async fn next_item(session: Option<&mut LiveSession>) -> SessionItem {
    match session {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}
