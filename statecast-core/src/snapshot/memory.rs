//! In-memory snapshot.

use dashmap::DashMap;

use super::SnapshotStore;
use crate::error::SnapshotError;

/// In-memory snapshot. Survives controller recreation, not the process.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    entries: DashMap<String, String>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate from `(key, value)` pairs, as a host restoring saved
    /// state would.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemorySnapshot {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
