//! Common test setup functions.

use api::{router, state::AppState};
use axum::Router;
use ingest_core::{Record, RecordStore, Result, SaveOutcome, StreamIdentity};
use pg_store::query::{count_streams, query_records, StoredRecord};
use pg_store::{pg_store, PgClient, PgStore};
use std::sync::Arc;
use telemetry::Metrics;

use crate::containers::TestContainers;

/// Test context backed by a real PostgreSQL container.
///
/// Saves go through the production store and save protocol; read-back uses
/// the query helpers so assertions see exactly what is persisted.
pub struct TestContext {
    pub containers: TestContainers,
    pub client: PgClient,
    pub store: Arc<PgStore>,
    pub metrics: Arc<Metrics>,
    pub router: Router,
}

impl TestContext {
    /// Create a new test context with the schema applied.
    pub async fn new() -> Self {
        Self::with_pool_size(10).await
    }

    pub async fn with_pool_size(max_connections: u32) -> Self {
        let containers = TestContainers::start().await;

        let client = PgClient::connect(containers.postgres_config(max_connections))
            .await
            .expect("Failed to connect to PostgreSQL");
        let store = Arc::new(pg_store(client.clone()));

        let metrics = Arc::new(Metrics::new());
        let router = router(AppState::new(metrics.clone()));

        Self {
            containers,
            client,
            store,
            metrics,
            router,
        }
    }

    pub async fn save(&self, record: &Record) -> Result<SaveOutcome> {
        self.store.save(record).await
    }

    pub async fn stream_rows(&self, identity: &StreamIdentity) -> i64 {
        count_streams(&self.client, identity)
            .await
            .expect("Failed to count streams")
    }

    pub async fn records(&self, identity: &StreamIdentity) -> Vec<StoredRecord> {
        query_records(&self.client, identity)
            .await
            .expect("Failed to query records")
    }
}
