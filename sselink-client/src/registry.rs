//! Subscription registry
//!
//! The only shared mutable state in the transport: a map from subscription
//! id to the supervision handle of its connection. Entries are inserted at
//! subscribe time, mutated in place during reconnection (through the shared
//! connection record, not the map), and removed exactly once during
//! teardown — removal is idempotent, so the unsubscribe path and the
//! driver's own terminal path can both call it safely.
//!
//! The registry is injectable: every link owns its own instance, there is
//! no module-level singleton, and tests can build isolated registries. It
//! stores only supervision state (shared record + abort handle), never the
//! consumer's observer, so tearing an entry down cannot keep a caller
//! alive.

use crate::classify::CategorizedError;
use crate::connection::{ConnectionShared, ConnectionState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Supervision handle for one live subscription.
pub(crate) struct RegistryEntry {
    /// Introspection and teardown state shared with the driver task
    pub(crate) shared: Arc<ConnectionShared>,
    /// Abort handle for the driver task; aborting drops the socket and
    /// every timer the task owns
    pub(crate) abort: AbortHandle,
}

/// Introspection snapshot of one active subscription.
///
/// What the operational surface exposes: enough to render a
/// connection-status view without reaching into live state.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    /// Subscription id
    pub id: String,
    /// Operation name, when the descriptor carried one
    pub operation_name: Option<String>,
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Reconnection attempts since the last successful connect
    pub reconnect_attempts: u32,
    /// Most recent classified failure, if any
    pub last_error: Option<CategorizedError>,
    /// Time since the subscription was opened
    pub age: Duration,
    /// Time since the last activity on the stream
    pub idle: Duration,
}

/// Map from subscription id to connection supervision state.
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegistryEntry>> {
        // Entries stay usable even if a panic poisoned the lock; the data
        // is supervision state, not invariant-bearing.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, id: String, entry: RegistryEntry) {
        self.lock().insert(id, entry);
    }

    /// Remove an entry; `false` when it was already gone.
    pub(crate) fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub(crate) fn drain(&self) -> Vec<RegistryEntry> {
        self.lock().drain().map(|(_, entry)| entry).collect()
    }

    /// Whether a subscription with this id is currently tracked.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of tracked subscriptions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every active subscription, for operational visibility.
    pub fn active(&self) -> Vec<SubscriptionInfo> {
        self.lock()
            .values()
            .map(|entry| SubscriptionInfo {
                id: entry.shared.id.clone(),
                operation_name: entry.shared.operation_name.clone(),
                state: entry.shared.state(),
                reconnect_attempts: entry.shared.attempts(),
                last_error: entry.shared.last_error(),
                age: entry.shared.created_at.elapsed(),
                idle: entry.shared.last_activity().elapsed(),
            })
            .collect()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> RegistryEntry {
        let shared = Arc::new(ConnectionShared::new(id.to_string(), None));
        // A finished task still yields a valid abort handle
        let task = tokio::spawn(async {});
        RegistryEntry {
            shared,
            abort: task.abort_handle(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let registry = SubscriptionRegistry::new();
        registry.insert("sub-0".to_string(), entry("sub-0"));

        assert!(registry.contains("sub-0"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_removal_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry.insert("sub-0".to_string(), entry("sub-0"));

        assert!(registry.remove("sub-0"));
        assert!(!registry.remove("sub-0"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_active_snapshot() {
        let registry = SubscriptionRegistry::new();
        registry.insert("sub-0".to_string(), entry("sub-0"));
        registry.insert("sub-1".to_string(), entry("sub-1"));

        let mut infos = registry.active();
        infos.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].id, "sub-0");
        assert_eq!(infos[0].state, ConnectionState::Connecting);
        assert_eq!(infos[0].reconnect_attempts, 0);
        assert!(infos[0].last_error.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_serializes_for_status_views() {
        let registry = SubscriptionRegistry::new();
        registry.insert("sub-0".to_string(), entry("sub-0"));

        let json = serde_json::to_string(&registry.active()).unwrap();
        assert!(json.contains("\"sub-0\""));
        assert!(json.contains("connecting"));
    }

    #[tokio::test]
    async fn test_drain_empties_registry() {
        let registry = SubscriptionRegistry::new();
        registry.insert("sub-0".to_string(), entry("sub-0"));
        registry.insert("sub-1".to_string(), entry("sub-1"));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }
}
