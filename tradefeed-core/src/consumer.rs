use std::sync::Arc;

use crate::types::{Event, FeedError};

/// A registered receiver of feed events.
///
/// `on_event` runs synchronously on the symbol's dispatch task, before the next
/// event for that symbol is taken. It must not block indefinitely: a stuck
/// consumer stalls every later publish for the same symbol.
pub trait FeedConsumer: Send + Sync {
    /// Label used when reporting faults.
    fn name(&self) -> &str {
        "consumer"
    }

    /// Handle one event.
    ///
    /// # Errors
    /// An error is reported by the dispatcher and handled per its `ConsumerFaultPolicy`.
    fn on_event(&self, event: &Event) -> Result<(), FeedError>;
}

struct FnConsumer<F> {
    name: String,
    f: F,
}

impl<F> FeedConsumer for FnConsumer<F>
where
    F: Fn(&Event) -> Result<(), FeedError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &Event) -> Result<(), FeedError> {
        (self.f)(event)
    }
}

/// Adapt an infallible closure into a consumer.
pub fn consumer_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn FeedConsumer>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(FnConsumer {
        name: name.into(),
        f: move |event: &Event| {
            f(event);
            Ok::<(), FeedError>(())
        },
    })
}

/// Adapt a fallible closure into a consumer.
pub fn try_consumer_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn FeedConsumer>
where
    F: Fn(&Event) -> Result<(), FeedError> + Send + Sync + 'static,
{
    Arc::new(FnConsumer {
        name: name.into(),
        f,
    })
}
