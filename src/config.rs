//! Engine configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! yields [`EngineConfig::default`].
//!
//! ```toml
//! rewrite_budget = 10000
//! cache_capacity = 4096
//! record_traces = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Maximum rewrite steps per normalization before the run is declared non-terminating.
pub const DEFAULT_REWRITE_BUDGET: usize = 10_000;

/// Default number of normalized types kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 4_096;

const fn default_rewrite_budget() -> usize {
    DEFAULT_REWRITE_BUDGET
}

const fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Step budget of one normalization run.
    #[serde(default = "default_rewrite_budget")]
    pub rewrite_budget: usize,
    /// Normalization cache capacity. `0` disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Keep a rewrite trace in traced normalization results.
    #[serde(default)]
    pub record_traces: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rewrite_budget: DEFAULT_REWRITE_BUDGET,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            record_traces: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rewrite_budget == 0 {
            return Err(ConfigError::Invalid("rewrite_budget must be positive".into()));
        }
        Ok(())
    }
}
