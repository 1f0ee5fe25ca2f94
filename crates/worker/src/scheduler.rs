//! Pipeline scheduler: wires the receive loop, worker pool, retention sweeper
//! and stats reporter together and spawns them.

use ingest_core::{Decoder, PacketSource, RecordStore, RetentionPolicy};
use std::sync::Arc;
use telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::persist::spawn_workers;
use crate::queue::{bounded, QueueReceiver};
use crate::receiver::{LoopExit, ReceiveConfig, ReceiveLoop};
use crate::retention::RetentionSweeper;

/// Everything needed to start a pipeline.
pub struct Pipeline<S> {
    config: PipelineConfig,
    retention: RetentionPolicy,
    source: S,
    decoder: Arc<dyn Decoder>,
    store: Arc<dyn RecordStore>,
    metrics: Arc<Metrics>,
    pool_size: Option<u32>,
}

/// Handles to the running pipeline tasks.
pub struct PipelineHandles {
    /// Resolves when the receive loop ends; a fatal exit means the process
    /// should stop.
    pub receive: JoinHandle<LoopExit>,
    pub workers: Vec<JoinHandle<()>>,
    pub sweeper: JoinHandle<()>,
    pub stats: JoinHandle<()>,
}

impl PipelineHandles {
    /// Waits for every task except the receive loop, which callers await
    /// first.
    pub async fn join_background(self) {
        for handle in self.workers {
            let _ = handle.await;
        }
        let _ = self.sweeper.await;
        let _ = self.stats.await;
    }
}

impl<S: PacketSource + 'static> Pipeline<S> {
    pub fn new(
        config: PipelineConfig,
        retention: RetentionPolicy,
        source: S,
        decoder: Arc<dyn Decoder>,
        store: Arc<dyn RecordStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            retention,
            source,
            decoder,
            store,
            metrics,
            pool_size: None,
        }
    }

    /// Records the database pool size so undersized pools are reported.
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Spawns every pipeline task. All of them stop when `cancel` fires.
    pub fn start(self, cancel: &CancellationToken) -> PipelineHandles {
        if let Some(pool_size) = self.pool_size {
            if (pool_size as usize) < self.config.workers {
                warn!(
                    pool_size = pool_size,
                    workers = self.config.workers,
                    "Connection pool is smaller than the worker pool; workers will wait on connections"
                );
            }
        }

        let (tx, rx) = bounded(self.config.queue_capacity);

        let workers = spawn_workers(
            self.config.workers,
            &rx,
            self.decoder,
            self.store.clone(),
            &self.metrics,
            cancel,
        );
        info!(count = workers.len(), "Persistence workers started");

        let sweeper = RetentionSweeper::new(self.store, self.retention, self.metrics.clone());
        let sweeper = tokio::spawn(sweeper.run(cancel.clone()));

        let stats = tokio::spawn(run_stats(
            rx,
            self.metrics.clone(),
            self.config.clone(),
            cancel.clone(),
        ));

        let receive = ReceiveLoop::new(
            self.source,
            tx,
            ReceiveConfig::from(&self.config),
            self.metrics,
        );
        let receive = tokio::spawn(receive.run(cancel.clone()));

        info!("Pipeline started");

        PipelineHandles {
            receive,
            workers,
            sweeper,
            stats,
        }
    }
}

/// Publishes queue depth and logs counters on every stats tick.
async fn run_stats(
    queue: QueueReceiver,
    metrics: Arc<Metrics>,
    config: PipelineConfig,
    cancel: CancellationToken,
) {
    let mut ticker = interval(config.stats_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let depth = queue.len();
        metrics.queue_depth.set(depth as i64);

        let snapshot = metrics.snapshot();
        info!(
            received = snapshot.packets_received,
            processed = snapshot.packets_processed,
            errored = snapshot.packets_errored,
            duplicates = snapshot.duplicates,
            dropped = snapshot.packets_dropped,
            queue_depth = depth,
            queue_capacity = queue.capacity(),
            save_latency_mean_ms = snapshot.save_latency_mean_ms,
            last_latency_ms = snapshot.last_record_latency_ms,
            "Pipeline stats"
        );
    }
}
