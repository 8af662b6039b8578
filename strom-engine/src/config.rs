//! Engine configuration.

use serde::{Deserialize, Serialize};
use strom_core::error::{Result, StromError};

/// Configuration for the threaded engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of compute workers per execution context.
    ///
    /// Bounds how many `Normal`/`Async` invocations targeting one context
    /// run (or are launched) concurrently.
    pub compute_workers: usize,
    /// Number of concurrent transfer channels per execution context.
    ///
    /// Bounds how many copy invocations run at once; transfers share
    /// interconnect bandwidth, so this is usually a small number.
    pub copy_channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compute_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            copy_channels: 2,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables, falling back to defaults
    /// for anything unset or unparsable:
    /// - `STROM_COMPUTE_WORKERS`: compute workers per context
    /// - `STROM_COPY_CHANNELS`: concurrent transfer channels per context
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            compute_workers: env_usize("STROM_COMPUTE_WORKERS")
                .unwrap_or(defaults.compute_workers),
            copy_channels: env_usize("STROM_COPY_CHANNELS").unwrap_or(defaults.copy_channels),
        }
    }

    /// Set the number of compute workers per context.
    #[must_use]
    pub fn with_compute_workers(mut self, workers: usize) -> Self {
        self.compute_workers = workers.max(1);
        self
    }

    /// Set the number of concurrent transfer channels per context.
    #[must_use]
    pub fn with_copy_channels(mut self, channels: usize) -> Self {
        self.copy_channels = channels.max(1);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `E104` if any pool size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.compute_workers == 0 {
            return Err(StromError::WorkerPoolSize {
                what: "compute_workers".to_string(),
            });
        }
        if self.copy_channels == 0 {
            return Err(StromError::WorkerPoolSize {
                what: "copy_channels".to_string(),
            });
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.compute_workers >= 1);
        assert_eq!(config.copy_channels, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_clamp_to_one() {
        let config = EngineConfig::default()
            .with_compute_workers(0)
            .with_copy_channels(0);
        assert_eq!(config.compute_workers, 1);
        assert_eq!(config.copy_channels, 1);
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let config = EngineConfig {
            compute_workers: 0,
            copy_channels: 2,
        };
        assert!(matches!(
            config.validate(),
            Err(StromError::WorkerPoolSize { .. })
        ));
    }

    #[test]
    fn from_env_overrides_defaults() {
        std::env::set_var("STROM_COMPUTE_WORKERS", "3");
        std::env::set_var("STROM_COPY_CHANNELS", "5");
        let config = EngineConfig::from_env();
        std::env::remove_var("STROM_COMPUTE_WORKERS");
        std::env::remove_var("STROM_COPY_CHANNELS");

        assert_eq!(config.compute_workers, 3);
        assert_eq!(config.copy_channels, 5);
    }
}
