//! Persisted Snapshot
//!
//! A small key/value port for state that has to survive the process being
//! killed and restarted. The controller reads each key once at startup and
//! writes through on every set; it is the only writer.
//!
//! Two backends ship with the crate: [`MemorySnapshot`] for tests and for
//! hosts that persist the map themselves, and [`FileSnapshot`], a JSON file
//! rewritten atomically on every write.

mod file;
mod memory;
mod persisted;

use std::fmt;

pub use file::FileSnapshot;
pub use memory::MemorySnapshot;
pub use persisted::{restore, Persisted};

use crate::error::SnapshotError;

/// The keys the controller persists under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKey {
    /// Last value of the live trigger channel.
    TriggerLive,
    /// Last value of the state trigger channel.
    TriggerState,
    /// Loaded value of the live channel.
    LoadLive,
    /// Loaded value of the state channel.
    LoadState,
}

impl SnapshotKey {
    pub const ALL: [SnapshotKey; 4] = [
        SnapshotKey::TriggerLive,
        SnapshotKey::TriggerState,
        SnapshotKey::LoadLive,
        SnapshotKey::LoadState,
    ];

    /// The key as stored.
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotKey::TriggerLive => "TriggerLiveDataKey",
            SnapshotKey::TriggerState => "TriggerStateFlowKey",
            SnapshotKey::LoadLive => "LoadLiveDataKey",
            SnapshotKey::LoadState => "LoadStateFlowKey",
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value persistence port.
///
/// Writes are synchronous: when `set` returns `Ok`, the entry is durable.
pub trait SnapshotStore: Send + Sync {
    /// The value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), SnapshotError>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
