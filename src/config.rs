//! JSON configuration for worker limits and timeouts.
//!
//! The configuration file is a small JSON document; missing files and
//! missing fields fall back to defaults, so a config file is never
//! required.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::scheduler::WorkerPoolConfig;

/// Default per-operation timeout in seconds.
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300;

fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

/// User-facing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker override; 0 derives the count from the CPU core count.
    pub max_parallel_jobs: usize,
    /// Per-operation timeout in seconds.
    pub operation_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_parallel_jobs: 0,
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on IO failure (other than not-found) or
    /// invalid JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };

        let config: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Maps this configuration onto a worker pool configuration.
    ///
    /// A positive `max_parallel_jobs` replaces the CPU-derived worker
    /// count; zero keeps the derived value.
    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        let mut pool = WorkerPoolConfig::default();
        if self.max_parallel_jobs > 0 {
            pool.workers = self.max_parallel_jobs;
        }
        pool.operation_timeout = Duration::from_secs(self.operation_timeout_secs);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.max_parallel_jobs, 0);
        assert_eq!(config.operation_timeout_secs, 300);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(&dir.path().join("does-not-exist.json")).expect("load");

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(
            file,
            r#"{{"max_parallel_jobs": 2, "operation_timeout_secs": 60}}"#
        )
        .expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.max_parallel_jobs, 2);
        assert_eq!(config.operation_timeout_secs, 60);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_parallel_jobs": 8}"#).expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.max_parallel_jobs, 8);
        assert_eq!(config.operation_timeout_secs, 300);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").expect("write");

        assert!(matches!(Config::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_override_replaces_derived_worker_count() {
        let config = Config {
            max_parallel_jobs: 7,
            operation_timeout_secs: 120,
        };

        let pool = config.worker_pool_config();
        assert_eq!(pool.workers, 7);
        assert_eq!(pool.operation_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_zero_keeps_derived_worker_count() {
        let pool = Config::default().worker_pool_config();

        // Derived from the CPU clamp, never zero.
        assert!(pool.workers >= 1);
        assert!(pool.workers <= 4);
    }
}
