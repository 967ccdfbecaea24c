//! Docker Engine API client built on bollard

use super::{EventStream, RuntimeClient};
use crate::error::ExporterError;
use crate::models::{ContainerSnapshot, RuntimeEvent};
use async_trait::async_trait;
use bollard::models::{ContainerStatsResponse, ContainerSummary, EventMessage};
use bollard::query_parameters::{EventsOptions, ListContainersOptionsBuilder, StatsOptionsBuilder};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffered events between the bollard stream and the supervisor
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform default socket, then
    /// negotiate the API version with the daemon.
    pub async fn connect(timeout: Duration) -> Result<Self, ExporterError> {
        let docker = Docker::connect_with_local_defaults()?.with_timeout(timeout);

        let docker = match docker.clone().negotiate_version().await {
            Ok(negotiated) => {
                info!("Negotiated Docker API version");
                negotiated
            }
            Err(e) => {
                warn!(error = %e, "Docker API version negotiation failed, using client default");
                docker
            }
        };

        Ok(Self { docker })
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    fn subscribe_events(&self, cancel: CancellationToken) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let events = docker.events(None::<EventsOptions>);
            tokio::pin!(events);

            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = events.next() => item,
                };

                let forwarded = match item {
                    Some(Ok(message)) => Ok(runtime_event(message)),
                    Some(Err(e)) => Err(ExporterError::from(e)),
                    None => break,
                };

                let terminal = forwarded.is_err();
                if tx.send(forwarded).await.is_err() || terminal {
                    break;
                }
            }

            debug!("Docker event forwarder stopped");
        });

        Box::pin(ReceiverStream::new(rx))
    }

    async fn list_running_containers(&self) -> Result<Vec<ContainerSnapshot>, ExporterError> {
        let filters = HashMap::from([("status".to_string(), vec!["running".to_string()])]);
        let options = ListContainersOptionsBuilder::default()
            .filters(&filters)
            .build();

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers.into_iter().map(container_snapshot).collect())
    }

    async fn fetch_usage(&self, container_id: &str) -> Result<Vec<u8>, ExporterError> {
        let options = StatsOptionsBuilder::default().stream(false).build();
        let stats = self.docker.stats(container_id, Some(options));
        tokio::pin!(stats);

        match stats.next().await {
            Some(Ok(report)) => usage_body(&report),
            Some(Err(e)) => Err(e.into()),
            None => Err(ExporterError::EmptyStats(container_id.to_string())),
        }
    }
}

fn runtime_event(message: EventMessage) -> RuntimeEvent {
    let actor = message.actor.unwrap_or_default();
    RuntimeEvent {
        kind: message.typ.map(|typ| typ.to_string()).unwrap_or_default(),
        action: message.action.unwrap_or_default(),
        actor_id: actor.id.unwrap_or_default(),
        actor_attributes: actor.attributes.unwrap_or_default(),
    }
}

fn container_snapshot(summary: ContainerSummary) -> ContainerSnapshot {
    ContainerSnapshot {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
    }
}

/// Stats reports are handed on in the Engine API's JSON shape
fn usage_body(report: &ContainerStatsResponse) -> Result<Vec<u8>, ExporterError> {
    Ok(serde_json::to_vec(report)?)
}
