//! Seismic waveform ingestion service.
//!
//! Streams miniSEED records from a SeedLink server and persists them to
//! PostgreSQL:
//! - Receive loop with a liveness watchdog feeding a bounded queue
//! - Persistence worker pool with an idempotent save protocol
//! - Retention sweeper bounding storage growth
//! - Health and counter endpoints over HTTP
//!
//! Stream faults are not recovered in process. On any fatal receive-loop
//! condition the process exits non-zero and the supervisor restarts it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::AppState;
use ingest_core::{MiniSeedDecoder, RetentionPolicy};
use pg_store::{pg_store, PgClient, PostgresConfig};
use seedlink::{SeedLinkConfig, SeedLinkSource};
use telemetry::{health, init_tracing_from_env, Metrics};
use worker::{LoopExit, Pipeline, PipelineConfig, QueueFullPolicy};

/// How often the database health flag is refreshed.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    seedlink: SeedLinkConfig,

    #[serde(default)]
    postgres: PostgresConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    retention: RetentionPolicy,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            seedlink: SeedLinkConfig::default(),
            postgres: PostgresConfig::default(),
            pipeline: PipelineConfig::default(),
            retention: RetentionPolicy::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting wave-ingest v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .pipeline
        .validate()
        .context("Invalid pipeline configuration")?;
    config
        .retention
        .validate()
        .context("Invalid retention configuration")?;

    info!(
        seedlink = %config.seedlink.address,
        streams = ?config.seedlink.streams,
        workers = config.pipeline.workers,
        queue_capacity = config.pipeline.queue_capacity,
        queue_full_policy = ?config.pipeline.queue_full_policy,
        retention_hours = config.retention.horizon_hours,
        "Loaded configuration"
    );

    let cancel = CancellationToken::new();
    let metrics = Arc::new(Metrics::new());

    // The health surface is up before the collaborators so readiness can be probed.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;
    let server_cancel = cancel.clone();
    let server = tokio::spawn(api::serve(addr, AppState::new(metrics.clone()), async move {
        server_cancel.cancelled().await
    }));

    let startup = async {
        let client = PgClient::connect_with_retry(config.postgres.clone(), &cancel)
            .await
            .context("Failed to connect to PostgreSQL")?;
        let source = SeedLinkSource::connect_with_retry(&config.seedlink, &cancel)
            .await
            .context("Failed to connect to SeedLink")?;
        anyhow::Ok((client, source))
    };

    let (client, source) = tokio::select! {
        result = startup => result?,
        _ = shutdown_signal() => {
            cancel.cancel();
            info!("Shutdown requested during startup");
            return Ok(());
        }
    };

    let _health_task = spawn_health_refresh(client.clone(), cancel.clone());

    let pool_size = client.config().max_connections;
    let mut handles = Pipeline::new(
        config.pipeline.clone(),
        config.retention.clone(),
        source,
        Arc::new(MiniSeedDecoder::new()),
        Arc::new(pg_store(client)),
        metrics.clone(),
    )
    .with_pool_size(pool_size)
    .start(&cancel);

    let exit = tokio::select! {
        exit = &mut handles.receive => exit.context("Receive loop panicked")?,
        _ = shutdown_signal() => {
            cancel.cancel();
            (&mut handles.receive).await.context("Receive loop panicked")?
        }
    };

    match exit {
        LoopExit::Fatal(condition) => {
            let snapshot = metrics.snapshot();
            error!(
                condition = %condition,
                received = snapshot.packets_received,
                processed = snapshot.packets_processed,
                "Fatal pipeline condition, exiting for restart"
            );
            std::process::exit(1);
        }
        LoopExit::Cancelled => {
            info!("Shutting down...");
            handles.join_background().await;
            if let Ok(Err(e)) = server.await {
                warn!("HTTP server error: {}", e);
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("WAVE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for the settings most often set by deployment tooling.
    if let Ok(address) = std::env::var("WAVE_SEEDLINK_ADDRESS") {
        config.seedlink.address = address;
    }
    if let Ok(streams) = std::env::var("WAVE_SEEDLINK_STREAMS") {
        config.seedlink.streams = streams
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(selectors) = std::env::var("WAVE_SEEDLINK_SELECTORS") {
        config.seedlink.selectors = Some(selectors).filter(|s| !s.trim().is_empty());
    }
    if let Ok(url) = std::env::var("WAVE_POSTGRES_URL") {
        config.postgres.url = url;
    }
    if let Ok(policy) = std::env::var("WAVE_QUEUE_FULL_POLICY") {
        config.pipeline.queue_full_policy = match policy.to_ascii_lowercase().as_str() {
            "abort" => QueueFullPolicy::Abort,
            "drop" => QueueFullPolicy::Drop,
            other => anyhow::bail!("Unknown queue full policy: {}", other),
        };
    }

    Ok(config)
}

/// Periodically refreshes the PostgreSQL health flag.
fn spawn_health_refresh(client: PgClient, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if pg_store::health::check_connection(&client).await {
                health().postgres.set_healthy();
            } else {
                health().postgres.set_unhealthy("Connection failed");
            }
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
