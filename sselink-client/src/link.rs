//! The subscription transport link
//!
//! This module provides the public entry point of the transport:
//! [`SubscriptionLink`], which accepts subscription operations and manages
//! one supervised connection per subscribe call, and
//! [`SubscriptionHandle`], the consumer's teardown lever.
//!
//! # Link Lifecycle
//!
//! 1. **Build**: configure endpoint, retry policy, heartbeat window
//! 2. **Subscribe**: one supervised connection per call
//! 3. **Consume**: push callbacks or a pull stream
//! 4. **Teardown**: per-subscription unsubscribe, or `dispose_all` at
//!    application shutdown / credential rotation
//!
//! # Delivery Contract
//!
//! Per subscription the consumer sees data events in socket order, then at
//! most one terminal event — an error or a completion, never both, never
//! more than one of either. Reconnection attempts are invisible except
//! through [`SubscriptionLink::subscriptions`]. After
//! [`SubscriptionHandle::unsubscribe`] returns, no further events are
//! delivered at all.
//!
//! # Cloning
//!
//! The link hands out handles rather than being cloned itself; dropping a
//! handle without unsubscribing leaves the subscription running under the
//! link's registry (use `dispose_all` to sweep).

use crate::config::LinkConfig;
use crate::connection::{ConnectionDriver, ConnectionShared, ConnectionState};
use crate::connector::{StreamConnector, StreamRequest};
use crate::link_builder::LinkBuilder;
use crate::metrics::LinkMetrics;
use crate::observer::{ChannelObserver, SubscriptionObserver, SubscriptionStream};
use crate::registry::{RegistryEntry, SubscriptionInfo, SubscriptionRegistry};
use sselink_core::{codec, Error, Operation, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// The public entry point of the streaming transport.
///
/// Accepts subscription operations, allocates a subscription id and a
/// supervised connection for each, and exposes the push-based delivery
/// contract plus the operational introspection surface.
///
/// Requires a running tokio runtime; each subscription spawns one driver
/// task.
///
/// # Examples
///
/// ```rust,no_run
/// use sselink_client::{CallbackObserver, SubscriptionLink};
/// use sselink_core::Operation;
///
/// # async fn example() -> sselink_core::Result<()> {
/// let link = SubscriptionLink::builder("https://gateway.local/graphql/stream")
///     .header("Authorization", "Bearer token")
///     .build()?;
///
/// let handle = link.subscribe(
///     Operation::subscription("subscription { sessionEvents { id } }"),
///     CallbackObserver::new().on_next(|event| println!("{}", event)),
/// )?;
///
/// // ... later
/// handle.unsubscribe();
/// # Ok(())
/// # }
/// ```
pub struct SubscriptionLink {
    config: LinkConfig,
    connector: Arc<dyn StreamConnector>,
    registry: Arc<SubscriptionRegistry>,
    next_id: AtomicU64,
    metrics: Option<Arc<LinkMetrics>>,
}

impl SubscriptionLink {
    /// Start building a link for the given endpoint.
    pub fn builder(url: impl Into<String>) -> LinkBuilder {
        LinkBuilder::new(url)
    }

    /// Create a link with the default HTTP connector.
    pub fn new(config: LinkConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(crate::connector::HttpConnector::new()),
            None,
        )
    }

    pub(crate) fn from_parts(
        config: LinkConfig,
        connector: Arc<dyn StreamConnector>,
        metrics: Option<Arc<LinkMetrics>>,
    ) -> Self {
        Self {
            config,
            connector,
            registry: Arc::new(SubscriptionRegistry::new()),
            next_id: AtomicU64::new(0),
            metrics,
        }
    }

    /// The link's configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Open a subscription, delivering into `observer`.
    ///
    /// Exactly one connection is created per call. The observer is moved
    /// into the connection's driver task and dropped at teardown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] for queries and mutations —
    /// those belong to the request/response transport — and
    /// [`Error::Serialization`] if the operation's variables cannot be
    /// encoded into the stream address.
    pub fn subscribe(
        &self,
        operation: Operation,
        observer: impl SubscriptionObserver,
    ) -> Result<SubscriptionHandle> {
        if !operation.kind.is_subscription() {
            return Err(Error::UnsupportedOperation(format!(
                "{} operations belong to the request transport; the streaming link only handles subscriptions",
                operation.kind
            )));
        }

        let url = codec::stream_url(&self.config.url, &operation)?;
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(ConnectionShared::new(
            id.clone(),
            operation.operation_name.clone(),
        ));

        let driver = ConnectionDriver {
            shared: Arc::clone(&shared),
            registry: Arc::clone(&self.registry),
            connector: Arc::clone(&self.connector),
            request: StreamRequest {
                url,
                headers: self.config.headers.clone(),
                credentials: self.config.credentials,
            },
            policy: self.config.retry.clone(),
            heartbeat_timeout: self.config.heartbeat_timeout,
            observer: Box::new(observer),
            metrics: self.metrics.clone(),
        };

        // Gate the driver until its registry entry exists, so a fast
        // terminal outcome cannot race its own insertion.
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = ready_rx.await;
            driver.run().await;
        });

        self.registry.insert(
            id.clone(),
            RegistryEntry {
                shared: Arc::clone(&shared),
                abort: task.abort_handle(),
            },
        );
        let _ = ready_tx.send(());

        if let Some(m) = &self.metrics {
            m.update_active(self.registry.len() as i64);
        }
        tracing::debug!(
            id = %id,
            operation = ?shared.operation_name,
            "subscription opened"
        );

        Ok(SubscriptionHandle {
            id,
            shared,
            abort: task.abort_handle(),
            registry: Arc::clone(&self.registry),
            metrics: self.metrics.clone(),
        })
    }

    /// Open a subscription and consume it as a `futures::Stream`.
    ///
    /// The stream yields data events in delivery order and ends after the
    /// terminal event (or after `unsubscribe` on the returned handle).
    pub fn subscribe_stream(
        &self,
        operation: Operation,
    ) -> Result<(SubscriptionHandle, SubscriptionStream)> {
        let (observer, stream) = ChannelObserver::channel();
        let handle = self.subscribe(operation, observer)?;
        Ok((handle, stream))
    }

    /// Snapshot of every active subscription, for operational visibility.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.registry.active()
    }

    /// Number of currently tracked subscriptions.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Tear down every active subscription deterministically.
    ///
    /// Used at application shutdown or credential rotation. No consumer
    /// callbacks fire for subscriptions disposed this way.
    pub fn dispose_all(&self) {
        let entries = self.registry.drain();
        let count = entries.len();
        for entry in entries {
            if entry.shared.close() {
                entry.shared.set_state(ConnectionState::Disconnected);
            }
            entry.abort.abort();
        }
        if let Some(m) = &self.metrics {
            m.update_active(0);
        }
        if count > 0 {
            tracing::info!(count, "disposed all subscriptions");
        }
    }
}

/// Teardown lever for one subscription.
///
/// Dropping the handle does **not** tear the subscription down; call
/// [`unsubscribe`](Self::unsubscribe), or sweep everything with
/// [`SubscriptionLink::dispose_all`].
pub struct SubscriptionHandle {
    id: String,
    shared: Arc<ConnectionShared>,
    abort: AbortHandle,
    registry: Arc<SubscriptionRegistry>,
    metrics: Option<Arc<LinkMetrics>>,
}

impl SubscriptionHandle {
    /// The subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state of the underlying connection.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Tear the subscription down.
    ///
    /// Synchronous and idempotent. Suppresses any further consumer
    /// deliveries, stops the driver task (dropping its socket and both its
    /// heartbeat and reconnect timers), and removes the registry entry.
    /// Calling it again — or after the subscription already terminated —
    /// is a no-op.
    pub fn unsubscribe(&self) {
        if self.shared.close() {
            self.shared.set_state(ConnectionState::Disconnected);
            tracing::debug!(id = %self.id, "unsubscribed");
        }
        self.abort.abort();
        self.registry.remove(&self.id);
        if let Some(m) = &self.metrics {
            m.update_active(self.registry.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::CallbackObserver;

    fn test_link() -> SubscriptionLink {
        let config = LinkConfig::new("https://gateway.local/graphql/stream").unwrap();
        SubscriptionLink::new(config)
    }

    #[tokio::test]
    async fn test_rejects_non_subscription_operations() {
        let link = test_link();

        let query = Operation::query("query { me }");
        let result = link.subscribe(query, CallbackObserver::new());
        assert!(matches!(result, Err(Error::UnsupportedOperation(_))));

        let mutation = Operation::mutation("mutation { bump }");
        let result = link.subscribe(mutation, CallbackObserver::new());
        assert!(matches!(result, Err(Error::UnsupportedOperation(_))));

        assert_eq!(link.active_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_ids_are_unique() {
        let link = test_link();

        let a = link
            .subscribe(
                Operation::subscription("subscription { a }"),
                CallbackObserver::new(),
            )
            .unwrap();
        let b = link
            .subscribe(
                Operation::subscription("subscription { b }"),
                CallbackObserver::new(),
            )
            .unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(link.active_count(), 2);

        a.unsubscribe();
        b.unsubscribe();
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let link = test_link();
        let handle = link
            .subscribe(
                Operation::subscription("subscription { a }"),
                CallbackObserver::new(),
            )
            .unwrap();

        handle.unsubscribe();
        handle.unsubscribe();

        assert_eq!(link.active_count(), 0);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_dispose_all_empties_registry() {
        let link = test_link();
        for doc in ["subscription { a }", "subscription { b }"] {
            link.subscribe(Operation::subscription(doc), CallbackObserver::new())
                .unwrap();
        }
        assert_eq!(link.active_count(), 2);

        link.dispose_all();
        assert_eq!(link.active_count(), 0);
    }
}
