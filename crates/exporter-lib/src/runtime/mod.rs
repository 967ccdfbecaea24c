//! Container runtime access
//!
//! The exporter only needs three capabilities from the runtime: an event
//! subscription, a listing of running containers and one usage report per
//! container. `DockerRuntime` provides them over the Docker Engine API.

mod docker;

pub use docker::DockerRuntime;

use crate::error::ExporterError;
use crate::models::{ContainerSnapshot, RuntimeEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// Stream of runtime events. An `Err` item or the end of the stream means
/// the subscription is no longer usable.
pub type EventStream = BoxStream<'static, Result<RuntimeEvent, ExporterError>>;

#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Open a new event subscription that lives until `cancel` fires
    fn subscribe_events(&self, cancel: CancellationToken) -> EventStream;

    /// Containers whose status is `running`
    async fn list_running_containers(&self) -> Result<Vec<ContainerSnapshot>, ExporterError>;

    /// Raw JSON stats body for a single container
    async fn fetch_usage(&self, container_id: &str) -> Result<Vec<u8>, ExporterError>;
}
