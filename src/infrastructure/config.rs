//! Configuration management for the dispatch engine
//!
//! Loads configuration from workq.toml at startup.
//! All values are configurable to avoid hardcoded constants.

use crate::{DispatchError, Result};
use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// Loaded from workq.toml at startup or built directly in code. Contains
/// all tunable parameters of the dispatch core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum number of work functions executing concurrently
    #[serde(default = "default_max_outstanding")]
    pub max_outstanding: usize,

    /// Number of long-lived worker tasks
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Buffer free-list capacity (0 disables pooling, always allocates fresh)
    #[serde(default = "default_buffer_pool_capacity")]
    pub buffer_pool_capacity: usize,

    /// Nominal byte capacity of each pooled buffer
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_outstanding: default_max_outstanding(),
            worker_count: default_worker_count(),
            buffer_pool_capacity: default_buffer_pool_capacity(),
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_max_outstanding() -> usize {
    64
}

fn default_worker_count() -> usize {
    8
}

fn default_buffer_pool_capacity() -> usize {
    256
}

fn default_buffer_size() -> usize {
    4096
}

impl EngineConfig {
    /// Load configuration from the workq.toml file
    ///
    /// The path can be overridden with the `CONFIG_PATH` environment
    /// variable. A missing file yields the default configuration.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "workq.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                let config: EngineConfig = toml::from_str(&contents)
                    .map_err(|e| DispatchError::Config(format!("failed to parse config: {e}")))?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(EngineConfig::default())
            }
            Err(e) => Err(DispatchError::Config(format!(
                "failed to read config file: {e}"
            ))),
        }
    }

    /// Check the positivity requirements
    ///
    /// # Errors
    /// `max_outstanding` and `worker_count` must both be greater than zero;
    /// `buffer_pool_capacity` may be zero (pooling disabled).
    pub fn validate(&self) -> Result<()> {
        if self.max_outstanding == 0 {
            return Err(DispatchError::Config(
                "max_outstanding must be > 0".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(DispatchError::Config(
                "worker_count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
