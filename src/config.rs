//! Configuration for activity-stream

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::PoolSettings;
use crate::error::StreamError;
use crate::stream::DEFAULT_MAX_STREAM_SIZE;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("activity-stream")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// SQLite database file name inside `storage_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Entries kept per stream (0 or negative = unbounded)
    #[serde(default = "default_max_stream_size")]
    pub max_stream_size: i64,

    /// Maximum pooled database connections
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// Seconds to wait for a pooled connection
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Milliseconds SQLite waits on a locked database
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_file() -> String {
    "activities.db".to_string()
}

fn default_max_stream_size() -> i64 {
    DEFAULT_MAX_STREAM_SIZE
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            database_file: default_database_file(),
            max_stream_size: DEFAULT_MAX_STREAM_SIZE,
            pool_max_size: 8,
            connection_timeout_secs: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StreamError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| StreamError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StreamError> {
        let content = toml::to_string_pretty(self).map_err(|e| StreamError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get database file path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }

    /// Connection pool settings
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.pool_max_size.max(1),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}
