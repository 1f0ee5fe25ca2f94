//! [`StoreBackend`] over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Record, Store, StoreBackend, StreamIdentity};

use crate::client::PgClient;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Inserts only when the stream row exists; zero rows affected means it does not.
const INSERT_RECORD: &str = r#"
INSERT INTO wave.record (stream_pk, start_time, latency, raw)
SELECT stream_pk, $5, $6, $7
FROM wave.stream
WHERE network = $1 AND station = $2 AND channel = $3 AND location = $4
"#;

const INSERT_STREAM: &str = r#"
INSERT INTO wave.stream (network, station, channel, location)
VALUES ($1, $2, $3, $4)
"#;

const DELETE_OLDER_THAN: &str = "DELETE FROM wave.record WHERE start_time < $1";

/// PostgreSQL storage backend.
#[derive(Clone)]
pub struct PgBackend {
    client: PgClient,
}

impl PgBackend {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PgClient {
        &self.client
    }
}

/// Store running the idempotent save protocol against PostgreSQL.
pub type PgStore = Store<PgBackend>;

/// Builds a [`PgStore`] from a connected client.
pub fn pg_store(client: PgClient) -> PgStore {
    Store::new(PgBackend::new(client))
}

#[async_trait]
impl StoreBackend for PgBackend {
    type Error = sqlx::Error;

    async fn insert_record(&self, record: &Record) -> Result<u64, sqlx::Error> {
        let id = &record.identity;
        let result = sqlx::query(INSERT_RECORD)
            .bind(&id.network)
            .bind(&id.station)
            .bind(&id.channel)
            .bind(&id.location)
            .bind(record.start_time)
            .bind(record.latency_secs())
            .bind(record.raw.as_ref())
            .execute(self.client.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_stream(&self, identity: &StreamIdentity) -> Result<(), sqlx::Error> {
        sqlx::query(INSERT_STREAM)
            .bind(&identity.network)
            .bind(&identity.station)
            .bind(&identity.channel)
            .bind(&identity.location)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(DELETE_OLDER_THAN)
            .bind(cutoff)
            .execute(self.client.pool())
            .await?;
        Ok(result.rows_affected())
    }

    fn is_duplicate_key(&self, err: &sqlx::Error) -> bool {
        is_unique_violation(err)
    }
}

/// Whether a sqlx error is a PostgreSQL unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
