//! PostgreSQL health checks.

use crate::client::PgClient;
use tracing::{debug, error};

/// Check PostgreSQL connection health.
pub async fn check_connection(client: &PgClient) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(client.pool())
        .await
    {
        Ok(_) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            false
        }
    }
}
