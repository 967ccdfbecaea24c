//! Per-container resource usage gatherer
//!
//! Every gather cycle resets the cpu, memory and network gauge families,
//! lists the running containers and fetches one stats report per container
//! concurrently. A container whose report cannot be fetched or decoded is
//! skipped; the rest of the cycle is unaffected.

use super::Gatherer;
use crate::error::Result;
use crate::health::{components, HealthRegistry};
use crate::labels::ServiceLabels;
use crate::models::{ContainerSnapshot, UsageReport};
use crate::runtime::RuntimeClient;
use async_trait::async_trait;
use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const NAMESPACE: &str = "docker";
const CONTAINER_LABELS: &[&str] = &["containerName", "serviceName", "serviceID", "type"];

/// The three gauge families written by a gather cycle
#[derive(Clone)]
struct UsageGauges {
    cpu: GaugeVec,
    mem: GaugeVec,
    net: GaugeVec,
}

impl UsageGauges {
    fn new() -> Result<Self> {
        Ok(Self {
            cpu: usage_gauge("cpu", "stat_ns", "Container cpu usage.")?,
            mem: usage_gauge("mem", "stat_bytes", "Container memory usage.")?,
            net: usage_gauge("net", "stat_bytes", "Container network usage.")?,
        })
    }

    fn reset(&self) {
        self.cpu.reset();
        self.mem.reset();
        self.net.reset();
    }

    /// Write one container's report. Memory and cpu are absolute values;
    /// network counters accumulate across interfaces.
    fn record(&self, container_name: &str, service: &ServiceLabels, report: &UsageReport) {
        let (service_name, service_id) = (service.name.as_str(), service.id.as_str());
        let labels = move |kind: &'static str| [container_name, service_name, service_id, kind];

        self.mem
            .with_label_values(&labels("used"))
            .set(report.memory_used_bytes as f64);

        self.cpu
            .with_label_values(&labels("usermode"))
            .set(report.cpu.user_ns as f64);
        self.cpu
            .with_label_values(&labels("kernelmode"))
            .set(report.cpu.kernel_ns as f64);
        self.cpu
            .with_label_values(&labels("throttled"))
            .set(report.cpu.throttled_ns as f64);

        for iface in report.networks.values() {
            self.net
                .with_label_values(&labels("rx"))
                .add(iface.rx_bytes as f64);
            self.net
                .with_label_values(&labels("tx"))
                .add(iface.tx_bytes as f64);
            self.net
                .with_label_values(&labels("drop"))
                .add(iface.dropped() as f64);
            self.net
                .with_label_values(&labels("error"))
                .add(iface.errors() as f64);
        }
    }
}

fn usage_gauge(subsystem: &str, name: &str, help: &str) -> Result<GaugeVec> {
    Ok(GaugeVec::new(
        Opts::new(name, help)
            .namespace(NAMESPACE)
            .subsystem(subsystem),
        CONTAINER_LABELS,
    )?)
}

/// Outcome counts for one gather cycle
#[derive(Debug, Default)]
struct GatherResults {
    success_count: usize,
    error_count: usize,
}

pub struct StatsGatherer {
    client: Arc<dyn RuntimeClient>,
    gauges: UsageGauges,
    health: HealthRegistry,
}

impl StatsGatherer {
    pub fn new(client: Arc<dyn RuntimeClient>, health: HealthRegistry) -> Result<Self> {
        Ok(Self {
            client,
            gauges: UsageGauges::new()?,
            health,
        })
    }

    /// Fan out one task per container and wait for all of them
    async fn collect_all(&self, containers: Vec<ContainerSnapshot>) -> GatherResults {
        let mut tasks = JoinSet::new();

        for container in containers {
            let client = self.client.clone();
            let gauges = self.gauges.clone();
            tasks.spawn(async move {
                let result = collect_container(client.as_ref(), &gauges, &container).await;
                (container.id, result)
            });
        }

        let mut results = GatherResults::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => results.success_count += 1,
                Ok((container_id, Err(e))) => {
                    results.error_count += 1;
                    debug!(
                        container_id = %container_id,
                        error = %e,
                        "Skipping container stats"
                    );
                }
                Err(e) => {
                    results.error_count += 1;
                    warn!(error = %e, "Container stats task failed");
                }
            }
        }

        results
    }
}

async fn collect_container(
    client: &dyn RuntimeClient,
    gauges: &UsageGauges,
    container: &ContainerSnapshot,
) -> Result<()> {
    let raw = client.fetch_usage(&container.id).await?;
    let report = UsageReport::from_json(&raw)?;

    let service = ServiceLabels::resolve(&container.labels);
    gauges.record(&container.display_name(), &service, &report);
    Ok(())
}

#[async_trait]
impl Gatherer for StatsGatherer {
    fn name(&self) -> &'static str {
        "container_stats"
    }

    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.gauges.cpu.clone()),
            Box::new(self.gauges.mem.clone()),
            Box::new(self.gauges.net.clone()),
        ]
    }

    async fn gather(&self) {
        // Clear first so stopped containers leave no stale series, even when
        // the listing below fails.
        self.gauges.reset();

        let start = Instant::now();
        let containers = match self.client.list_running_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "Failed to list running containers");
                self.health
                    .set_degraded(components::RUNTIME_API, e.to_string())
                    .await;
                return;
            }
        };
        self.health.set_healthy(components::RUNTIME_API).await;

        let total = containers.len();
        let results = self.collect_all(containers).await;

        info!(
            containers = total,
            succeeded = results.success_count,
            failed = results.error_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Container stats gathered"
        );
    }
}
