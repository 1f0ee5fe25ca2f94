//! Receive loop and watchdog.
//!
//! Pulls packets from the source and hands data packets to the ingestion
//! queue. There is no in-process recovery for stream faults: a terminated
//! source, invalid framing, a full queue, or a silent connection all end the
//! loop with a [`FatalCondition`], and the process is expected to exit and be
//! restarted from scratch.

use ingest_core::{Packet, PacketSource};
use std::sync::Arc;
use std::time::Duration;
use telemetry::Metrics;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{PipelineConfig, QueueFullPolicy};
use crate::queue::{EnqueueError, QueueSender};

/// A condition the receive loop does not recover from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalCondition {
    #[error("source terminated the stream")]
    SourceTerminated,
    #[error("invalid packet: {0}")]
    InvalidPacket(String),
    #[error("no packet for {idle:?} (limit {horizon:?})")]
    WatchdogExpired { idle: Duration, horizon: Duration },
    #[error("ingestion queue full at capacity {capacity}")]
    QueueFull { capacity: usize },
    #[error("ingestion queue has no consumers")]
    QueueClosed,
}

/// How the receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Fatal(FatalCondition),
    Cancelled,
}

/// Liveness settings for the receive loop.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    pub idle_horizon: Duration,
    pub idle_backoff: Duration,
    pub queue_full_policy: QueueFullPolicy,
}

impl From<&PipelineConfig> for ReceiveConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            idle_horizon: config.idle_horizon(),
            idle_backoff: config.idle_backoff(),
            queue_full_policy: config.queue_full_policy,
        }
    }
}

/// Single task feeding the ingestion queue.
pub struct ReceiveLoop<S> {
    source: S,
    queue: QueueSender,
    config: ReceiveConfig,
    metrics: Arc<Metrics>,
}

impl<S: PacketSource> ReceiveLoop<S> {
    pub fn new(source: S, queue: QueueSender, config: ReceiveConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            source,
            queue,
            config,
            metrics,
        }
    }

    /// Runs until a fatal condition or cancellation.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopExit {
        info!(
            idle_horizon_secs = self.config.idle_horizon.as_secs(),
            queue_capacity = self.queue.capacity(),
            policy = ?self.config.queue_full_policy,
            "Receive loop starting"
        );

        let mut last_packet = Instant::now();

        loop {
            let idle = last_packet.elapsed();
            if idle > self.config.idle_horizon {
                return self.fatal(FatalCondition::WatchdogExpired {
                    idle,
                    horizon: self.config.idle_horizon,
                });
            }

            let packet = tokio::select! {
                _ = cancel.cancelled() => return LoopExit::Cancelled,
                packet = self.source.collect() => packet,
            };

            match packet {
                Packet::Data(raw) if raw.is_data() => match self.queue.try_enqueue(raw) {
                    Ok(()) => {
                        last_packet = Instant::now();
                        self.metrics.packets_received.inc();
                    }
                    Err(EnqueueError::Full(raw)) => match self.config.queue_full_policy {
                        QueueFullPolicy::Abort => {
                            return self.fatal(FatalCondition::QueueFull {
                                capacity: self.queue.capacity(),
                            })
                        }
                        QueueFullPolicy::Drop => {
                            self.metrics.packets_dropped.inc();
                            warn!(
                                sequence = ?raw.sequence,
                                capacity = self.queue.capacity(),
                                "Ingestion queue full, packet dropped"
                            );
                        }
                    },
                    Err(EnqueueError::Closed(_)) => {
                        return self.fatal(FatalCondition::QueueClosed);
                    }
                },
                Packet::Data(raw) => {
                    self.metrics.packets_skipped.inc();
                    debug!(sequence = ?raw.sequence, "Skipping non-data packet");
                }
                Packet::Idle => {
                    tokio::select! {
                        _ = cancel.cancelled() => return LoopExit::Cancelled,
                        _ = tokio::time::sleep(self.config.idle_backoff) => {}
                    }
                }
                Packet::Terminated => return self.fatal(FatalCondition::SourceTerminated),
                Packet::Invalid(reason) => {
                    return self.fatal(FatalCondition::InvalidPacket(reason))
                }
            }
        }
    }

    fn fatal(&self, condition: FatalCondition) -> LoopExit {
        error!(
            condition = %condition,
            received = self.metrics.packets_received.get(),
            queued = self.queue.len(),
            "Receive loop stopping"
        );
        LoopExit::Fatal(condition)
    }
}
