//! Pipeline counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down, and below zero).
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn set(&self, val: i64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds: 1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 5000ms; the last
    /// slot counts everything above.
    buckets: [AtomicU64; 12],
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let slot = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_millis().min(u64::MAX as u128) as u64);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper_bound_ms, count)` pairs; the overflow slot has bound `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Counters for one running pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Receive loop
    pub packets_received: Counter,
    pub packets_skipped: Counter,
    pub packets_dropped: Counter,

    // Workers
    pub packets_processed: Counter,
    pub packets_errored: Counter,
    pub decode_errors: Counter,
    pub store_errors: Counter,
    pub duplicates: Counter,
    pub streams_created: Counter,

    // Retention
    pub records_deleted: Counter,
    pub sweep_errors: Counter,

    // Latency
    pub save_latency_ms: Histogram,
    /// Most recent receipt latency in milliseconds; negative when a record
    /// claims to end in the future.
    pub last_record_latency_ms: Gauge,

    pub queue_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub packets_received: u64,
    pub packets_skipped: u64,
    pub packets_dropped: u64,
    pub packets_processed: u64,
    pub packets_errored: u64,
    pub decode_errors: u64,
    pub store_errors: u64,
    pub duplicates: u64,
    pub streams_created: u64,
    pub records_deleted: u64,
    pub sweep_errors: u64,
    pub saves: u64,
    pub save_latency_mean_ms: f64,
    pub save_latency_max_ms: u64,
    pub last_record_latency_ms: i64,
    pub queue_depth: i64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            packets_received: self.packets_received.get(),
            packets_skipped: self.packets_skipped.get(),
            packets_dropped: self.packets_dropped.get(),
            packets_processed: self.packets_processed.get(),
            packets_errored: self.packets_errored.get(),
            decode_errors: self.decode_errors.get(),
            store_errors: self.store_errors.get(),
            duplicates: self.duplicates.get(),
            streams_created: self.streams_created.get(),
            records_deleted: self.records_deleted.get(),
            sweep_errors: self.sweep_errors.get(),
            saves: self.save_latency_ms.count(),
            save_latency_mean_ms: self.save_latency_ms.mean(),
            save_latency_max_ms: self.save_latency_ms.max(),
            last_record_latency_ms: self.last_record_latency_ms.get(),
            queue_depth: self.queue_depth.get(),
        }
    }
}
