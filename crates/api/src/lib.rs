//! HTTP surface of the ingestion service: health probes and counters.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

/// Serves the router on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
