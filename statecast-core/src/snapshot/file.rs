//! JSON file snapshot.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::SnapshotStore;
use crate::error::SnapshotError;

/// Snapshot kept in a JSON object on disk.
///
/// Every `set` rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous snapshot in place.
#[derive(Debug)]
pub struct FileSnapshot {
    path: PathBuf,
    entries: Mutex<IndexMap<String, String>>,
}

impl FileSnapshot {
    /// Open the snapshot at `path`. A missing file is an empty snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => IndexMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "snapshot opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling the next write goes through: the file name with `.tmp`
    /// appended, never the snapshot itself.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write(&self, entries: &IndexMap<String, String>) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.staging_path();

        let io_err = |source: io::Error| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl SnapshotStore for FileSnapshot {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_owned(), value.to_owned());

        if let Err(err) = self.write(&entries) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(previous) => entries.insert(key.to_owned(), previous),
                None => entries.shift_remove(key),
            };
            return Err(err);
        }
        Ok(())
    }
}
