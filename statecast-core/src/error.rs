//! Error types.
//!
//! Each layer gets its own enum so callers can match on what actually went
//! wrong; [`Error`] folds them together for the top-level entry points.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a value from a [`Fetcher`](crate::fetch::Fetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The source was reached but could not produce a value.
    #[error("fetch failed: {0}")]
    Failed(String),

    /// The source is not reachable at all.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Failure to read or write the persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot file is not valid JSON: {0}")]
    Codec(#[from] serde_json::Error),

    /// The backing store refuses writes (used by read-only stores and tests).
    #[error("snapshot store is read-only")]
    ReadOnly,
}

/// Failure to load a [`Config`](crate::config::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure inside a value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Shared state spawns its upstream on a tokio runtime, so it has to be
    /// created inside one.
    #[error("shared state must be created inside a tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The store was dropped while a receiver was still waiting on it.
    #[error("value store closed")]
    Closed,
}

/// Top-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
