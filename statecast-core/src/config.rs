//! Controller configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable the demo reads a config path from.
pub const CONFIG_ENV: &str = "STATECAST_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Simulated latency of each fetch.
    pub fetch_delay_ms: u64,

    /// How long shared state keeps its upstream alive without observers.
    pub grace_period_ms: u64,

    /// Seed for the trigger channels when nothing was persisted.
    pub initial_value: String,

    /// Shown by the loaded channels until their first value arrives.
    pub placeholder: String,

    /// JSON file to persist the snapshot in. In-memory when unset.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_delay_ms: 2_000,
            grace_period_ms: 5_000,
            initial_value: "Initial".to_string(),
            placeholder: "Nothing".to_string(),
            snapshot_path: None,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Load from the file named by [`CONFIG_ENV`], or the defaults if unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
