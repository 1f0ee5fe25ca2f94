//! Pipeline configuration.

use ingest_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the receive loop does when the ingestion queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueFullPolicy {
    /// Stop the pipeline; the supervisor restarts the process.
    #[default]
    Abort,
    /// Drop the packet, count it, and keep receiving.
    Drop,
}

/// Pipeline sizing and liveness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ingestion queue capacity (packets)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of persistence workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Longest allowed gap between enqueued packets before the connection is
    /// considered hung
    #[serde(default = "default_idle_horizon_secs")]
    pub idle_horizon_secs: u64,
    /// Pause after an idle collect
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    #[serde(default)]
    pub queue_full_policy: QueueFullPolicy,
    /// Interval for logging pipeline counters
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_queue_capacity() -> usize {
    100_000
}

fn default_workers() -> usize {
    8
}

fn default_idle_horizon_secs() -> u64 {
    300
}

fn default_idle_backoff_ms() -> u64 {
    100
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            idle_horizon_secs: default_idle_horizon_secs(),
            idle_backoff_ms: default_idle_backoff_ms(),
            queue_full_policy: QueueFullPolicy::default(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn idle_horizon(&self) -> Duration {
        Duration::from_secs(self.idle_horizon_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::config("pipeline.queue_capacity must be positive"));
        }
        if self.workers == 0 {
            return Err(Error::config("pipeline.workers must be positive"));
        }
        if self.idle_horizon_secs == 0 {
            return Err(Error::config("pipeline.idle_horizon_secs must be positive"));
        }
        if self.stats_interval_secs == 0 {
            return Err(Error::config("pipeline.stats_interval_secs must be positive"));
        }
        Ok(())
    }
}
