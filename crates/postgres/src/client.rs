//! PostgreSQL connection pool wrapper.

use crate::config::PostgresConfig;
use crate::schema::all_statements;
use ingest_core::error::DbErrorCode;
use ingest_core::{Error, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use telemetry::health;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SCHEMA_LOCK_KEY: i64 = 0x7761_7665;

/// Pooled PostgreSQL client with the schema applied.
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
    config: PostgresConfig,
}

impl PgClient {
    /// Connects once and applies the schema.
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| Error::config(format!("invalid postgres url: {}", e)))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| Error::database(DbErrorCode::ConnectFailed, e.to_string()))?;

        let client = Self { pool, config };
        client.init_schema().await?;

        info!(
            max_connections = client.config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(client)
    }

    /// Connects, retrying with a fixed delay until it succeeds or `cancel` fires.
    ///
    /// Configuration errors are not retried.
    pub async fn connect_with_retry(
        config: PostgresConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let delay = config.startup_retry();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            match Self::connect(config.clone()).await {
                Ok(client) => {
                    health().postgres.set_healthy();
                    return Ok(client);
                }
                Err(e @ Error::Config(_)) => return Err(e),
                Err(e) => {
                    health().postgres.set_unhealthy(e.to_string());
                    warn!(
                        attempt = attempt,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "PostgreSQL not ready, retrying"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::internal("cancelled while connecting to PostgreSQL"));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Applies the DDL under an advisory lock so concurrent starters don't
    /// collide on catalog rows.
    async fn init_schema(&self) -> Result<()> {
        let schema_err =
            |e: sqlx::Error| Error::database(DbErrorCode::ConnectFailed, format!("schema: {}", e));

        let mut tx = self.pool.begin().await.map_err(schema_err)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(schema_err)?;

        for ddl in all_statements() {
            sqlx::query(ddl)
                .execute(&mut *tx)
                .await
                .map_err(schema_err)?;
        }

        tx.commit().await.map_err(schema_err)
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}
