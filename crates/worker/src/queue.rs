//! Bounded ingestion queue between the receive loop and the workers.
//!
//! One producer, many consumers. Enqueue never waits: the caller learns
//! immediately whether the packet was accepted. Dequeue waits for an item.
//! No ordering is promised across consumers.

use flume::{Receiver, Sender, TrySendError};
use ingest_core::RawPacket;

/// Why a packet was not enqueued. The packet is handed back.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("ingestion queue is full")]
    Full(RawPacket),
    #[error("ingestion queue has no consumers")]
    Closed(RawPacket),
}

/// Creates a queue holding at most `capacity` packets.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    assert!(capacity > 0, "ingestion queue capacity must be positive");
    let (tx, rx) = flume::bounded(capacity);
    (
        QueueSender { tx, capacity },
        QueueReceiver { rx, capacity },
    )
}

/// Producer half, held by the receive loop.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: Sender<RawPacket>,
    capacity: usize,
}

impl QueueSender {
    /// Enqueues without waiting.
    pub fn try_enqueue(&self, packet: RawPacket) -> Result<(), EnqueueError> {
        self.tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(p) => EnqueueError::Full(p),
            TrySendError::Disconnected(p) => EnqueueError::Closed(p),
        })
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer half; clone one per worker.
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    rx: Receiver<RawPacket>,
    capacity: usize,
}

impl QueueReceiver {
    /// Waits for the next packet. `None` once the sender is gone and the
    /// queue has drained.
    pub async fn dequeue(&self) -> Option<RawPacket> {
        self.rx.recv_async().await.ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
