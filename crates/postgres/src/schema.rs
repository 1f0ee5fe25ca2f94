//! PostgreSQL schema.
//!
//! The uniqueness constraints here are what make saves idempotent:
//! - `stream` is unique on the (network, station, channel, location) tuple
//! - `record` is keyed by (stream_pk, start_time)
//!
//! Every statement is idempotent so the schema can be applied on each start.

pub const CREATE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS wave";

pub const CREATE_STREAM_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wave.stream (
    stream_pk SERIAL PRIMARY KEY,
    network TEXT NOT NULL,
    station TEXT NOT NULL,
    channel TEXT NOT NULL,
    location TEXT NOT NULL,
    UNIQUE (network, station, channel, location)
)
"#;

pub const CREATE_RECORD_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wave.record (
    stream_pk INTEGER NOT NULL REFERENCES wave.stream (stream_pk) ON DELETE CASCADE,
    start_time TIMESTAMPTZ NOT NULL,
    -- seconds between receipt and the record's nominal end time
    latency DOUBLE PRECISION NOT NULL,
    raw BYTEA NOT NULL,
    PRIMARY KEY (stream_pk, start_time)
)
"#;

pub const CREATE_RECORD_START_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS record_start_time_idx ON wave.record (start_time)";

/// All DDL in dependency order.
pub fn all_statements() -> &'static [&'static str] {
    &[
        CREATE_SCHEMA,
        CREATE_STREAM_TABLE,
        CREATE_RECORD_TABLE,
        CREATE_RECORD_START_INDEX,
    ]
}
