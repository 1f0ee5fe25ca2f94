//! Tests for the health and counter endpoints.
//!
//! The health registry is process-global, so readiness transitions are
//! checked within a single test.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::containers::TestContainers;
use pg_store::PgClient;
use std::sync::Arc;
use telemetry::{health, Metrics};
use tokio_util::sync::CancellationToken;

fn server(metrics: Arc<Metrics>) -> TestServer {
    TestServer::new(api::router(api::AppState::new(metrics))).expect("Failed to create test server")
}

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let server = server(Arc::new(Metrics::new()));

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in [
        "status",
        "seedlink_connected",
        "postgres_connected",
        "queue_depth",
        "components",
    ] {
        assert!(body.get(field).is_some(), "Response should have '{}' field", field);
    }

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "unexpected status '{}'",
        status
    );
}

/// Test /health/live endpoint always returns 200 when service is running
#[tokio::test]
async fn test_live_endpoint() {
    server(Arc::new(Metrics::new()))
        .get("/health/live")
        .await
        .assert_status_ok();
}

/// Readiness follows the collaborators, with PostgreSQL connected for real.
///
/// Requires Docker to be running for testcontainers.
#[tokio::test]
async fn test_ready_follows_collaborators() {
    let containers = TestContainers::start().await;
    let server = server(Arc::new(Metrics::new()));

    health().seedlink.set_unhealthy("not connected");
    assert_eq!(
        server.get("/health/ready").await.status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    let _client = PgClient::connect_with_retry(
        containers.postgres_config(2),
        &CancellationToken::new(),
    )
    .await
    .expect("Failed to connect to PostgreSQL");

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["postgres_connected"], true);
    assert_eq!(body["seedlink_connected"], false);
    assert_eq!(body["status"], "degraded");

    health().seedlink.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
}

/// Test /metrics reflects pipeline counters
#[tokio::test]
async fn test_metrics_endpoint() {
    let metrics = Arc::new(Metrics::new());
    metrics.packets_received.inc_by(3);
    metrics.packets_processed.inc_by(2);
    metrics.decode_errors.inc();
    metrics.last_record_latency_ms.set(-250);

    let body: serde_json::Value = server(metrics).get("/metrics").await.json();

    assert_eq!(body["packets_received"], 3);
    assert_eq!(body["packets_processed"], 2);
    assert_eq!(body["decode_errors"], 1);
    assert_eq!(body["last_record_latency_ms"], -250);
}
