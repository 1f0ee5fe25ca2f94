//! Retention policy definitions.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Records older than this are eligible for deletion.
pub const DEFAULT_RETENTION_HOURS: u64 = 48;

/// Upper bound on the configured horizon (100 years).
pub const MAX_RETENTION_HOURS: u64 = 100 * 366 * 24;

/// How often the sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Retention policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Maximum record age in hours
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u64,
    /// Sweep interval in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_horizon_hours() -> u64 {
    DEFAULT_RETENTION_HOURS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            horizon_hours: default_horizon_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RetentionPolicy {
    /// Saturates instead of overflowing; `validate` rejects such horizons.
    pub fn horizon(&self) -> TimeDelta {
        i64::try_from(self.horizon_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .unwrap_or(TimeDelta::MAX)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(Error::config("retention.sweep_interval_secs must be positive"));
        }
        if self.horizon_hours > MAX_RETENTION_HOURS {
            return Err(Error::config(format!(
                "retention.horizon_hours must be at most {}",
                MAX_RETENTION_HOURS
            )));
        }
        Ok(())
    }

    /// Records with `start_time` strictly before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.horizon())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
