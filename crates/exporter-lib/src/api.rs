//! HTTP API for the Prometheus pull endpoint and health checks

use crate::error::{ExporterError, Result};
use crate::health::{ComponentStatus, HealthRegistry};
use crate::registry::MetricRegistry;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricRegistry>,
    pub health: HealthRegistry,
}

impl AppState {
    pub fn new(registry: Arc<MetricRegistry>, health: HealthRegistry) -> Self {
        Self { registry, health }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus pull endpoint. Refreshes every gatherer first; gatherer
/// failures show up as missing series, never as an error status.
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rendered = state.registry.render().await;

    (
        StatusCode::OK,
        [(CONTENT_TYPE, rendered.content_type)],
        rendered.body,
    )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Serve the API until `shutdown` fires.
///
/// After cancellation in-flight requests get `grace` to finish before the
/// server task is aborted. A bind failure or a server that stops on its own
/// is returned as an error.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Bind { addr, source })?;
    info!(addr = %addr, "Metrics server listening");

    state.health.set_ready(true).await;

    let app = create_router(state.clone());
    let graceful = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            state.health.set_ready(false).await;
            return match joined {
                Ok(Ok(())) => Err(ExporterError::Server(io::Error::other("listener closed"))),
                Ok(Err(e)) => Err(ExporterError::Server(e)),
                Err(e) => Err(ExporterError::Server(io::Error::other(e.to_string()))),
            };
        }
        _ = shutdown.cancelled() => {}
    }

    state.health.set_ready(false).await;
    info!(grace_ms = grace.as_millis() as u64, "Shutting down metrics server");

    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => info!("Metrics server closed"),
        Ok(Ok(Err(e))) => error!(error = %e, "Metrics server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "Metrics server task failed"),
        Err(_) => {
            warn!("Grace period elapsed, closing remaining connections");
            server.abort();
        }
    }

    Ok(())
}
