//! In-memory collaborators for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Packet, PacketSource, Record, StoreBackend, StreamIdentity};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Errors raised by [`MemoryBackend`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("duplicate key")]
    DuplicateKey,
    #[error("backend unavailable")]
    Unavailable,
}

#[derive(Default)]
struct Tables {
    next_pk: i32,
    streams: HashMap<StreamIdentity, i32>,
    records: HashMap<(i32, DateTime<Utc>), Record>,
}

/// Backend with the same uniqueness rules as the PostgreSQL schema.
///
/// Every operation yields to the scheduler first so concurrent saves
/// interleave between protocol steps.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later operation fail with [`MemoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn stream_count(&self) -> usize {
        self.tables.lock().streams.len()
    }

    pub fn record_count(&self) -> usize {
        self.tables.lock().records.len()
    }

    pub fn records_for(&self, identity: &StreamIdentity) -> Vec<Record> {
        let tables = self.tables.lock();
        let mut out: Vec<Record> = tables
            .records
            .values()
            .filter(|r| &r.identity == identity)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.start_time);
        out
    }

    async fn step(&self) -> Result<(), MemoryError> {
        tokio::task::yield_now().await;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    type Error = MemoryError;

    async fn insert_record(&self, record: &Record) -> Result<u64, MemoryError> {
        self.step().await?;
        let mut tables = self.tables.lock();
        let Some(&pk) = tables.streams.get(&record.identity) else {
            return Ok(0);
        };
        let key = (pk, record.start_time);
        if tables.records.contains_key(&key) {
            return Err(MemoryError::DuplicateKey);
        }
        tables.records.insert(key, record.clone());
        Ok(1)
    }

    async fn create_stream(&self, identity: &StreamIdentity) -> Result<(), MemoryError> {
        self.step().await?;
        let mut tables = self.tables.lock();
        if tables.streams.contains_key(identity) {
            return Err(MemoryError::DuplicateKey);
        }
        tables.next_pk += 1;
        let pk = tables.next_pk;
        tables.streams.insert(identity.clone(), pk);
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, MemoryError> {
        self.step().await?;
        let mut tables = self.tables.lock();
        let before = tables.records.len();
        tables.records.retain(|(_, start), _| *start >= cutoff);
        Ok((before - tables.records.len()) as u64)
    }

    fn is_duplicate_key(&self, err: &MemoryError) -> bool {
        *err == MemoryError::DuplicateKey
    }
}

/// Source that plays a script of packets with optional delays, then
/// reports `then` forever.
pub struct ScriptedSource {
    script: VecDeque<(Duration, Packet)>,
    then: Packet,
}

impl ScriptedSource {
    pub fn new(packets: impl IntoIterator<Item = Packet>, then: Packet) -> Self {
        Self {
            script: packets.into_iter().map(|p| (Duration::ZERO, p)).collect(),
            then,
        }
    }

    /// Delivers `packet` after waiting `delay`.
    pub fn after(mut self, delay: Duration, packet: Packet) -> Self {
        self.script.push_back((delay, packet));
        self
    }
}

#[async_trait]
impl PacketSource for ScriptedSource {
    async fn collect(&mut self) -> Packet {
        match self.script.pop_front() {
            Some((delay, packet)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                packet
            }
            None => self.then.clone(),
        }
    }
}
