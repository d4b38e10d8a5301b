//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default idle time before an unreferenced entity may be pruned.
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Default location of the classification data.
pub const DEFAULT_DATA_FILE: &str = "data/gameobj-data.xml";

/// Errors from building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LRU capacity must be at least 1")]
    ZeroCapacity,
}

/// Which identity index backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backing {
    /// Unbounded; idle unreferenced entries leave on prune.
    #[default]
    Ttl,
    /// Bounded by entry count; least recently used entries leave on overflow.
    Lru { capacity: usize },
}

/// Configuration for a [`crate::GameObjs`] session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameObjConfig {
    /// Identity index implementation.
    pub backing: Backing,

    /// TTL used by `prune_default` and `stats_default`.
    pub default_ttl_secs: u64,

    /// Classification data file. The custom override lives in
    /// `gameobj-custom/` beside it.
    pub data_file: PathBuf,
}

impl Default for GameObjConfig {
    fn default() -> Self {
        Self {
            backing: Backing::Ttl,
            default_ttl_secs: DEFAULT_TTL_SECS,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
        }
    }
}

impl GameObjConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the identity index implementation.
    pub fn with_backing(mut self, backing: Backing) -> Self {
        self.backing = backing;
        self
    }

    /// Use an LRU index holding at most `capacity` entries.
    pub fn with_lru(self, capacity: usize) -> Self {
        self.with_backing(Backing::Lru { capacity })
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the classification data file.
    pub fn with_data_file(mut self, path: impl AsRef<Path>) -> Self {
        self.data_file = path.as_ref().to_path_buf();
        self
    }

    /// The default TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Check settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backing {
            Backing::Lru { capacity: 0 } => Err(ConfigError::ZeroCapacity),
            _ => Ok(()),
        }
    }
}
