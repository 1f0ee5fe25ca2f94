//! Retention sweeper.
//!
//! On every tick, deletes all records that started before the retention
//! horizon. A failed sweep is logged and left for the next tick.

use chrono::{DateTime, Utc};
use ingest_core::{RecordStore, Result, RetentionPolicy};
use std::sync::Arc;
use telemetry::Metrics;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic deleter of expired records.
pub struct RetentionSweeper {
    store: Arc<dyn RecordStore>,
    policy: RetentionPolicy,
    metrics: Arc<Metrics>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn RecordStore>, policy: RetentionPolicy, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            policy,
            metrics,
        }
    }

    /// Deletes everything older than the horizon as of `now`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = self.policy.cutoff(now);
        match self.store.delete_older_than(cutoff).await {
            Ok(deleted) => {
                self.metrics.records_deleted.inc_by(deleted);
                if deleted > 0 {
                    info!(cutoff = %cutoff, deleted = deleted, "Expired records deleted");
                } else {
                    debug!(cutoff = %cutoff, "No expired records");
                }
                Ok(deleted)
            }
            Err(e) => {
                self.metrics.sweep_errors.inc();
                warn!(cutoff = %cutoff, error = %e, "Retention sweep failed");
                Err(e)
            }
        }
    }

    /// Sweeps on every interval tick until cancelled. The first tick fires
    /// immediately.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            horizon_hours = self.policy.horizon_hours,
            interval_secs = self.policy.sweep_interval_secs,
            "Retention sweeper started"
        );

        let mut ticker = interval(self.policy.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // Errors are already logged and counted.
            let _ = self.sweep_once(Utc::now()).await;
        }

        debug!("Retention sweeper stopped");
    }
}
