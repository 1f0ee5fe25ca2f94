//! Read-back queries for verifying what was persisted.

use crate::client::PgClient;
use chrono::{DateTime, Utc};
use ingest_core::{Error, Result, StreamIdentity};
use sqlx::FromRow;

/// Stored record as read back for verification.
#[derive(Debug, Clone, FromRow)]
pub struct StoredRecord {
    pub network: String,
    pub station: String,
    pub channel: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub latency: f64,
    pub raw: Vec<u8>,
}

impl StoredRecord {
    pub fn identity(&self) -> StreamIdentity {
        StreamIdentity::new(&self.network, &self.station, &self.channel, &self.location)
    }
}

fn query_error(e: sqlx::Error) -> Error {
    Error::internal(format!("Query error: {}", e))
}

/// Count stream rows for an identity.
pub async fn count_streams(client: &PgClient, identity: &StreamIdentity) -> Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM wave.stream \
         WHERE network = $1 AND station = $2 AND channel = $3 AND location = $4",
    )
    .bind(&identity.network)
    .bind(&identity.station)
    .bind(&identity.channel)
    .bind(&identity.location)
    .fetch_one(client.pool())
    .await
    .map_err(query_error)
}

/// Fetch records for a stream, oldest first.
pub async fn query_records(
    client: &PgClient,
    identity: &StreamIdentity,
) -> Result<Vec<StoredRecord>> {
    sqlx::query_as::<_, StoredRecord>(
        "SELECT s.network, s.station, s.channel, s.location, r.start_time, r.latency, r.raw \
         FROM wave.record r JOIN wave.stream s USING (stream_pk) \
         WHERE s.network = $1 AND s.station = $2 AND s.channel = $3 AND s.location = $4 \
         ORDER BY r.start_time",
    )
    .bind(&identity.network)
    .bind(&identity.station)
    .bind(&identity.channel)
    .bind(&identity.location)
    .fetch_all(client.pool())
    .await
    .map_err(query_error)
}
