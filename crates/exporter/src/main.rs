//! Docker Exporter - container usage and lifecycle metrics for Prometheus
//!
//! This binary runs as a sidecar on each Docker host, counting OOM kills
//! from the event stream and reporting per-container CPU, memory and
//! network usage on every scrape of `/metrics`.

use anyhow::Result;
use exporter_lib::{
    api::{self, AppState},
    health::components,
    DockerRuntime, EventSupervisor, HealthRegistry, MetricRegistry, RuntimeClient,
    StatsGatherer, SupervisorConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ExporterConfig::load()?;
    info!(
        version = EXPORTER_VERSION,
        listen_addr = %config.listen_addr(),
        "Starting docker-exporter"
    );

    let runtime: Arc<dyn RuntimeClient> =
        Arc::new(DockerRuntime::connect(config.docker_timeout()).await?);

    let health = HealthRegistry::new();
    health.register(components::EVENT_STREAM).await;
    health.register(components::RUNTIME_API).await;

    // Registration collisions are wiring errors; fail startup on them.
    let mut registry = MetricRegistry::new()?;
    registry.register_gatherer(Arc::new(StatsGatherer::new(
        runtime.clone(),
        health.clone(),
    )?))?;
    let registry = Arc::new(registry);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let supervisor = EventSupervisor::new(
        runtime,
        registry.clone(),
        health.clone(),
        SupervisorConfig {
            reconnect_backoff: config.reconnect_backoff(),
            unhealthy_after_failures: config.event_stream_unhealthy_after,
        },
    );
    let supervisor_handle = tokio::spawn(supervisor.run(shutdown.clone()));

    let state = Arc::new(AppState::new(registry, health));
    let served = api::serve(
        config.listen_addr(),
        state,
        shutdown.clone(),
        config.shutdown_grace(),
    )
    .await;

    // The server may have failed on its own; stop the supervisor either way.
    shutdown.cancel();
    if let Err(e) = supervisor_handle.await {
        error!(error = %e, "Event supervisor task failed");
    }

    served?;
    info!("Shut down cleanly");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
