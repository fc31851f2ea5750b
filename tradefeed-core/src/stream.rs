use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Abstraction over a handle that can be queried for completion and aborted.
pub trait Abortable {
    /// Abort the underlying task if it is still running.
    fn abort(&mut self);
    /// Return `true` if the underlying task has completed.
    fn is_finished(&self) -> bool;
}

impl Abortable for JoinHandle<()> {
    fn abort(&mut self) {
        // JoinHandle::abort takes &self
        Self::abort(self);
    }

    fn is_finished(&self) -> bool {
        Self::is_finished(self)
    }
}

/// Abstraction over a one-shot stop signal.
pub trait Stoppable {
    /// Send a best-effort stop signal to request graceful shutdown.
    fn send(self);
}

impl Stoppable for oneshot::Sender<()> {
    fn send(self) {
        let _ = Self::send(self, ());
    }
}

/// Drop-time logic for stream handles:
/// - send a best-effort stop signal if present
/// - abort the task if it hasn't finished yet
pub fn drop_impl<H, S>(inner: &mut Option<H>, stop_tx: &mut Option<S>)
where
    H: Abortable,
    S: Stoppable,
{
    if let Some(tx) = stop_tx.take() {
        tx.send();
    }
    if let Some(mut h) = inner.take()
        && !h.is_finished()
    {
        h.abort();
    }
}

/// Owner of a background streaming task.
///
/// `stop()` requests a cooperative shutdown and waits for the task to finish.
/// Dropping the handle sends the stop signal and aborts the task if it is still
/// running, so a session never outlives its handle.
#[derive(Debug)]
pub struct StreamHandle {
    inner: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl StreamHandle {
    /// Wrap a task that listens for a stop signal on the paired receiver.
    #[must_use]
    pub const fn new(inner: JoinHandle<()>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: Some(stop_tx),
        }
    }

    /// Wrap a task that can only be aborted.
    #[must_use]
    pub const fn new_abort_only(inner: JoinHandle<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: None,
        }
    }

    /// Send the stop signal without waiting. Calling it more than once has no further effect.
    pub fn request_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Request a graceful stop and wait for the task to finish.
    ///
    /// Abort-only handles are aborted instead, then awaited.
    pub async fn stop(mut self) {
        let graceful = self.stop_tx.is_some();
        self.request_stop();
        if let Some(join) = self.inner.take() {
            if !graceful {
                join.abort();
            }
            let _ = join.await;
        }
    }

    /// Abort the task immediately.
    pub fn abort(mut self) {
        if let Some(join) = self.inner.take() {
            join.abort();
        }
    }

    /// True once the task has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        drop_impl(&mut self.inner, &mut self.stop_tx);
    }
}
