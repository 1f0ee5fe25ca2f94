//! Health check endpoints.
//!
//! Readiness tracks the two collaborators the pipeline cannot run without:
//! the SeedLink session and the PostgreSQL pool. Both flags are set by the
//! startup retry loops and refreshed by the binary's periodic database check.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::health;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Component report plus the current queue backlog.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = health();
    let report = registry.report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        seedlink_connected: registry.seedlink.is_healthy(),
        postgres_connected: registry.postgres.is_healthy(),
        queue_depth: state.metrics.queue_depth.get(),
        components: report.components,
    })
}

/// GET /health/ready - 200 only while SeedLink is streaming and PostgreSQL
/// answers; 503 during startup retries or after the store check fails.
pub async fn ready_handler() -> StatusCode {
    probe_status(health().is_ready())
}

/// GET /health/live - Fatal conditions end the process, so any answer is 200.
pub async fn live_handler() -> StatusCode {
    probe_status(health().is_alive())
}

fn probe_status(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
