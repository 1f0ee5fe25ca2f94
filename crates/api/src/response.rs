//! Response bodies.

use serde::{Deserialize, Serialize};
use telemetry::health::ComponentHealthReport;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub seedlink_connected: bool,
    pub postgres_connected: bool,
    pub queue_depth: i64,
    pub components: Vec<ComponentHealthReport>,
}
