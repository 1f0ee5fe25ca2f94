//! Persistence workers draining the ingestion queue into the store.

use chrono::Utc;
use ingest_core::{Decoder, RawPacket, Record, RecordStore, SaveOutcome};
use std::sync::Arc;
use std::time::Instant;
use telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::QueueReceiver;

/// What happened to one dequeued packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Saved(SaveOutcome),
    DecodeFailed,
    StoreFailed,
}

/// One consumer of the ingestion queue.
///
/// Failures are per item: the packet is logged, counted and discarded, and the
/// worker moves on. Nothing is retried.
pub struct PersistWorker {
    id: usize,
    queue: QueueReceiver,
    decoder: Arc<dyn Decoder>,
    store: Arc<dyn RecordStore>,
    metrics: Arc<Metrics>,
}

impl PersistWorker {
    pub fn new(
        id: usize,
        queue: QueueReceiver,
        decoder: Arc<dyn Decoder>,
        store: Arc<dyn RecordStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            id,
            queue,
            decoder,
            store,
            metrics,
        }
    }

    /// Decodes and saves a single packet.
    pub async fn process(&self, packet: RawPacket) -> ProcessOutcome {
        let header = match self.decoder.decode(&packet.payload) {
            Ok(header) => header,
            Err(e) => {
                self.metrics.decode_errors.inc();
                self.metrics.packets_errored.inc();
                warn!(
                    worker = self.id,
                    sequence = ?packet.sequence,
                    error = %e,
                    "Discarding undecodable packet"
                );
                return ProcessOutcome::DecodeFailed;
            }
        };

        let record = Record::from_header(header, packet.payload, Utc::now());
        self.metrics
            .last_record_latency_ms
            .set(record.latency.num_milliseconds());

        let started = Instant::now();
        let result = self.store.save(&record).await;
        self.metrics.save_latency_ms.observe_duration(started.elapsed());

        match result {
            Ok(outcome) => {
                match outcome {
                    SaveOutcome::Duplicate => self.metrics.duplicates.inc(),
                    SaveOutcome::Inserted {
                        created_stream: true,
                    } => {
                        self.metrics.streams_created.inc();
                        info!(stream = %record.identity, "New stream registered");
                    }
                    SaveOutcome::Inserted { .. } => {}
                }
                self.metrics.packets_processed.inc();
                debug!(
                    worker = self.id,
                    stream = %record.identity,
                    start_time = %record.start_time,
                    latency_secs = record.latency_secs(),
                    duplicate = outcome.is_duplicate(),
                    "Record saved"
                );
                ProcessOutcome::Saved(outcome)
            }
            Err(e) => {
                self.metrics.store_errors.inc();
                self.metrics.packets_errored.inc();
                warn!(
                    worker = self.id,
                    stream = %record.identity,
                    start_time = %record.start_time,
                    code = e.error_code(),
                    error = %e,
                    "Failed to save record"
                );
                ProcessOutcome::StoreFailed
            }
        }
    }

    /// Processes packets until the queue closes or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        debug!(worker = self.id, "Persistence worker started");

        loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => break,
                packet = self.queue.dequeue() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };
            self.process(packet).await;
        }

        debug!(worker = self.id, "Persistence worker stopped");
    }
}

/// Spawns `count` workers sharing one queue, decoder, and store.
pub fn spawn_workers(
    count: usize,
    queue: &QueueReceiver,
    decoder: Arc<dyn Decoder>,
    store: Arc<dyn RecordStore>,
    metrics: &Arc<Metrics>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let worker = PersistWorker::new(
                id,
                queue.clone(),
                decoder.clone(),
                store.clone(),
                metrics.clone(),
            );
            tokio::spawn(worker.run(cancel.clone()))
        })
        .collect()
}
