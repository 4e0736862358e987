//! Write-through persistence for value stores.

use std::fmt;
use std::sync::Arc;

use super::{SnapshotKey, SnapshotStore};
use crate::reactive::{Observer, Subscription, ValueStore};

/// The value a store under `key` should start with: the persisted one if
/// present, otherwise `fallback`.
pub fn restore(snapshot: &dyn SnapshotStore, key: SnapshotKey, fallback: &str) -> String {
    match snapshot.get(key.as_str()) {
        Some(value) => {
            tracing::debug!(key = %key, value = %value, "restored from snapshot");
            value
        }
        None => fallback.to_owned(),
    }
}

/// A value store that writes every set through to the snapshot.
///
/// The snapshot write happens first and synchronously. If it fails the
/// failure is logged and the in-memory value is updated anyway.
pub struct Persisted<S> {
    store: S,
    key: SnapshotKey,
    snapshot: Arc<dyn SnapshotStore>,
}

impl<S> Persisted<S> {
    pub fn new(store: S, key: SnapshotKey, snapshot: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            key,
            snapshot,
        }
    }

    pub fn key(&self) -> SnapshotKey {
        self.key
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S> ValueStore<String> for Persisted<S>
where
    S: ValueStore<String>,
{
    fn get(&self) -> String {
        self.store.get()
    }

    fn set(&self, value: String) {
        if let Err(err) = self.snapshot.set(self.key.as_str(), &value) {
            tracing::warn!(key = %self.key, error = %err, "snapshot write failed");
        }
        self.store.set(value);
    }

    fn attach(&self, observer: Observer<String>) -> Subscription {
        self.store.attach(observer)
    }
}

impl<S: Clone> Clone for Persisted<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key,
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Persisted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.key)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnapshotError;
    use crate::reactive::LiveValue;
    use crate::snapshot::MemorySnapshot;

    struct ReadOnlySnapshot;

    impl SnapshotStore for ReadOnlySnapshot {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), SnapshotError> {
            Err(SnapshotError::ReadOnly)
        }
    }

    #[test]
    fn restore_prefers_snapshot() {
        let snapshot = MemorySnapshot::with_entries([("TriggerLiveDataKey", "0321")]);
        assert_eq!(
            restore(&snapshot, SnapshotKey::TriggerLive, "Initial"),
            "0321"
        );
        assert_eq!(
            restore(&snapshot, SnapshotKey::TriggerState, "Initial"),
            "Initial"
        );
    }

    #[test]
    fn set_writes_through() {
        let snapshot = Arc::new(MemorySnapshot::new());
        let store = Persisted::new(
            LiveValue::new("Initial".to_string()),
            SnapshotKey::TriggerLive,
            snapshot.clone(),
        );

        store.set("0654".to_string());
        assert_eq!(store.get(), "0654");
        assert_eq!(snapshot.get("TriggerLiveDataKey").as_deref(), Some("0654"));
    }

    #[test]
    fn failed_write_still_updates_memory() {
        let store = Persisted::new(
            LiveValue::new("Initial".to_string()),
            SnapshotKey::TriggerLive,
            Arc::new(ReadOnlySnapshot),
        );

        store.set("0001".to_string());
        assert_eq!(store.get(), "0001");
    }
}
