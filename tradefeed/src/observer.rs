use tradefeed_core::FeedError;

/// Receives errors that the feed and its stream connections cannot return to a caller.
///
/// `source` names where the error came from: a stream target such as
/// `"account"` or `"candles:BTCUSDT@1m"`, or a consumer name for dispatch faults.
/// Called from background tasks; keep it cheap.
pub trait ErrorObserver: Send + Sync {
    /// Observe one error.
    fn on_error(&self, source: &str, error: &FeedError);
}

/// Default observer: logs every error at `warn` level.
///
/// Without the `tracing` feature errors are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ErrorObserver for LogObserver {
    fn on_error(&self, source: &str, error: &FeedError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(source, error = %error, transient = error.is_transient(), "feed error");
        #[cfg(not(feature = "tracing"))]
        let _ = (source, error);
    }
}

impl<F> ErrorObserver for F
where
    F: Fn(&str, &FeedError) + Send + Sync,
{
    fn on_error(&self, source: &str, error: &FeedError) {
        self(source, error);
    }
}
