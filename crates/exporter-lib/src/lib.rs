//! Library for the Docker host exporter
//!
//! This crate provides the core functionality for:
//! - Subscribing to container lifecycle events and counting OOM kills
//! - Gathering per-container CPU, memory and network usage on each scrape
//! - Owning the Prometheus registry and serving the pull endpoint
//! - Health checks for the event stream and the runtime API

pub mod api;
pub mod collector;
pub mod error;
pub mod events;
pub mod health;
pub mod labels;
pub mod models;
pub mod registry;
pub mod runtime;

pub use collector::{Gatherer, StatsGatherer};
pub use error::{ExporterError, Result};
pub use events::{EventSupervisor, SupervisorConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use registry::MetricRegistry;
pub use runtime::{DockerRuntime, EventStream, RuntimeClient};
