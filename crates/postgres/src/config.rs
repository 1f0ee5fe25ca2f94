//! PostgreSQL configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL (may carry credentials; never logged)
    pub url: String,
    /// Connection pool size; should be at least the worker count
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a caller waits for a pooled connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Fixed delay between startup connection attempts
    #[serde(default = "default_startup_retry_secs")]
    pub startup_retry_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_startup_retry_secs() -> u64 {
    10
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://wave_w@localhost:5432/wave".to_string(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            startup_retry_secs: default_startup_retry_secs(),
        }
    }
}

impl PostgresConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn startup_retry(&self) -> Duration {
        Duration::from_secs(self.startup_retry_secs)
    }
}
