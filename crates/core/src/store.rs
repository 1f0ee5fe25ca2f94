//! Idempotent record persistence.
//!
//! [`Store`] runs the save protocol on top of any [`StoreBackend`]:
//!
//! 1. Insert the record, joined to its existing stream row.
//!    One row affected means done; a duplicate-key conflict means the record
//!    is already stored; zero rows means the stream does not exist yet.
//! 2. Create the stream. A duplicate-key conflict here means another worker
//!    won the race, which is just as good.
//! 3. Insert the record again. Its outcome is final.
//!
//! Correctness under concurrent and repeated delivery rests entirely on the
//! backend's uniqueness constraints on the stream tuple and on
//! `(stream, start_time)`. No application-level locks are taken.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{DbErrorCode, Error, Result};
use crate::record::{Record, StreamIdentity};

/// Storage operations a backend must provide.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts a record for an already existing stream, returning rows affected.
    /// Zero rows means the stream is unknown.
    async fn insert_record(&self, record: &Record) -> std::result::Result<u64, Self::Error>;

    /// Inserts a stream row.
    async fn create_stream(&self, identity: &StreamIdentity)
        -> std::result::Result<(), Self::Error>;

    /// Deletes every record with `start_time < cutoff`, returning rows deleted.
    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<u64, Self::Error>;

    /// Whether `err` is a uniqueness-constraint violation.
    fn is_duplicate_key(&self, err: &Self::Error) -> bool;
}

/// Result of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was written. `created_stream` is set when this call also
    /// created the stream row.
    Inserted { created_stream: bool },
    /// The record was already stored.
    Duplicate,
}

impl SaveOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

/// The persistence seam used by workers and the retention sweeper.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Saves a record idempotently.
    async fn save(&self, record: &Record) -> Result<SaveOutcome>;

    /// Deletes records that started before `cutoff`.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertAttempt {
    Inserted,
    Duplicate,
    StreamMissing,
}

/// Backend-agnostic store implementing the idempotent save protocol.
pub struct Store<B> {
    backend: B,
}

impl<B: StoreBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn try_insert(&self, record: &Record) -> Result<InsertAttempt> {
        match self.backend.insert_record(record).await {
            Ok(0) => Ok(InsertAttempt::StreamMissing),
            Ok(_) => Ok(InsertAttempt::Inserted),
            Err(e) if self.backend.is_duplicate_key(&e) => Ok(InsertAttempt::Duplicate),
            Err(e) => Err(Error::database(
                DbErrorCode::StoreFailed,
                format!("insert {} @ {}: {}", record.identity, record.start_time, e),
            )),
        }
    }

    async fn create_stream(&self, identity: &StreamIdentity) -> Result<bool> {
        match self.backend.create_stream(identity).await {
            Ok(()) => Ok(true),
            Err(e) if self.backend.is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(Error::database(
                DbErrorCode::StoreFailed,
                format!("create stream {}: {}", identity, e),
            )),
        }
    }
}

#[async_trait]
impl<B: StoreBackend> RecordStore for Store<B> {
    async fn save(&self, record: &Record) -> Result<SaveOutcome> {
        match self.try_insert(record).await? {
            InsertAttempt::Inserted => {
                return Ok(SaveOutcome::Inserted {
                    created_stream: false,
                })
            }
            InsertAttempt::Duplicate => return Ok(SaveOutcome::Duplicate),
            InsertAttempt::StreamMissing => {}
        }

        let created_stream = self.create_stream(&record.identity).await?;
        debug!(
            stream = %record.identity,
            created = created_stream,
            "Stream row ensured"
        );

        match self.try_insert(record).await? {
            InsertAttempt::Inserted => Ok(SaveOutcome::Inserted { created_stream }),
            InsertAttempt::Duplicate => Ok(SaveOutcome::Duplicate),
            InsertAttempt::StreamMissing => Err(Error::database(
                DbErrorCode::StreamMissing,
                format!("stream {} missing after create", record.identity),
            )),
        }
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.backend
            .delete_older_than(cutoff)
            .await
            .map_err(|e| Error::database(DbErrorCode::DeleteFailed, e.to_string()))
    }
}
