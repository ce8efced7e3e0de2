//! Consumer-facing delivery surface
//!
//! A subscription delivers events through the push-based contract the rest
//! of the client pipeline expects from any operation: `next` / `error` /
//! `complete`. Two shapes are offered:
//!
//! - [`SubscriptionObserver`]: callbacks, for pipelines that want to be
//!   driven. The observer is moved into the connection's driver task and
//!   dropped at teardown; nothing else retains it, so the registry never
//!   keeps a consumer alive.
//! - [`SubscriptionStream`]: a `futures::Stream` of
//!   [`SubscriptionEvent`]s, for consumers that want to pull. Backed by an
//!   unbounded channel fed by an internal observer.
//!
//! Either way the terminal contract holds: at most one error or one
//! completion per subscription, never both, and nothing at all after an
//! unsubscribe.

use crate::classify::CategorizedError;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The sink a subscription delivers into.
///
/// Callbacks run on the connection's driver task; keep them cheap and
/// non-blocking, and hand heavy work to your own executor.
pub trait SubscriptionObserver: Send + 'static {
    /// A data event, passed through from the stream unchanged.
    fn on_next(&mut self, payload: serde_json::Value);

    /// Terminal classified failure. No further events follow.
    fn on_error(&mut self, error: CategorizedError);

    /// Terminal completion from the server. No further events follow.
    fn on_complete(&mut self);
}

/// Observer assembled from closures.
///
/// Unset callbacks are no-ops, so a consumer that only cares about data
/// can supply just `on_next`.
///
/// # Examples
///
/// ```rust
/// use sselink_client::CallbackObserver;
///
/// let observer = CallbackObserver::new()
///     .on_next(|payload| println!("event: {}", payload))
///     .on_error(|error| eprintln!("stream failed: {}", error));
/// ```
#[derive(Default)]
pub struct CallbackObserver {
    next: Option<Box<dyn FnMut(serde_json::Value) + Send>>,
    error: Option<Box<dyn FnMut(CategorizedError) + Send>>,
    complete: Option<Box<dyn FnMut() + Send>>,
}

impl CallbackObserver {
    /// Create an observer with all callbacks unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data callback.
    pub fn on_next(mut self, f: impl FnMut(serde_json::Value) + Send + 'static) -> Self {
        self.next = Some(Box::new(f));
        self
    }

    /// Set the terminal-error callback.
    pub fn on_error(mut self, f: impl FnMut(CategorizedError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Set the completion callback.
    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl SubscriptionObserver for CallbackObserver {
    fn on_next(&mut self, payload: serde_json::Value) {
        if let Some(f) = &mut self.next {
            f(payload);
        }
    }

    fn on_error(&mut self, error: CategorizedError) {
        if let Some(f) = &mut self.error {
            f(error);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = &mut self.complete {
            f();
        }
    }
}

/// One delivered subscription event, in stream form.
#[derive(Debug)]
pub enum SubscriptionEvent {
    /// A data event
    Next(serde_json::Value),
    /// Terminal classified failure
    Error(CategorizedError),
    /// Terminal completion
    Complete,
}

/// Internal observer that feeds a [`SubscriptionStream`].
pub(crate) struct ChannelObserver {
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl ChannelObserver {
    /// Create the observer/stream pair backing `subscribe_stream`.
    pub(crate) fn channel() -> (Self, SubscriptionStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SubscriptionStream { rx })
    }
}

impl SubscriptionObserver for ChannelObserver {
    fn on_next(&mut self, payload: serde_json::Value) {
        // A dropped receiver just means the consumer stopped listening.
        let _ = self.tx.send(SubscriptionEvent::Next(payload));
    }

    fn on_error(&mut self, error: CategorizedError) {
        let _ = self.tx.send(SubscriptionEvent::Error(error));
    }

    fn on_complete(&mut self) {
        let _ = self.tx.send(SubscriptionEvent::Complete);
    }
}

/// Pull-shaped view of a subscription.
///
/// Yields events in delivery order and ends after a terminal event or
/// teardown. Obtained from
/// [`SubscriptionLink::subscribe_stream`](crate::SubscriptionLink::subscribe_stream).
pub struct SubscriptionStream {
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

impl SubscriptionStream {
    /// Receive the next event, or `None` once the subscription is over.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }
}

impl Stream for SubscriptionStream {
    type Item = SubscriptionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{CategorizedError, ErrorKind};
    use serde_json::json;

    #[test]
    fn test_callback_observer_dispatch() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let mut observer = CallbackObserver::new().on_next(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        SubscriptionObserver::on_next(&mut observer, json!({"a": 1}));
        SubscriptionObserver::on_next(&mut observer, json!({"a": 2}));
        // Unset callbacks are no-ops
        SubscriptionObserver::on_error(&mut observer, CategorizedError::new(ErrorKind::Server, "x"));
        SubscriptionObserver::on_complete(&mut observer);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_channel_observer_feeds_stream() {
        let (mut observer, mut stream) = ChannelObserver::channel();

        observer.on_next(json!({"n": 1}));
        observer.on_complete();
        drop(observer);

        match stream.next_event().await {
            Some(SubscriptionEvent::Next(payload)) => assert_eq!(payload["n"], json!(1)),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            stream.next_event().await,
            Some(SubscriptionEvent::Complete)
        ));
        assert!(stream.next_event().await.is_none());
    }

    #[test]
    fn test_channel_observer_tolerates_dropped_receiver() {
        let (mut observer, stream) = ChannelObserver::channel();
        drop(stream);
        observer.on_next(json!(1));
        observer.on_complete();
    }
}
