//! Core data models for the exporter

use crate::labels::ServiceLabels;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Lifecycle event as reported by the container runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: String,
    pub action: String,
    pub actor_id: String,
    pub actor_attributes: HashMap<String, String>,
}

/// Event reduced to the labels the event counter is keyed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub container_name: String,
    pub service_name: String,
    pub service_id: String,
    pub event_type: String,
}

impl NormalizedEvent {
    pub fn from_event(event: &RuntimeEvent) -> Self {
        let service = ServiceLabels::resolve(&event.actor_attributes);
        Self {
            container_name: event
                .actor_attributes
                .get("name")
                .cloned()
                .unwrap_or_default(),
            service_name: service.name,
            service_id: service.id,
            event_type: event.action.clone(),
        }
    }
}

/// A running container, as listed at the start of a gather cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub id: String,
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ContainerSnapshot {
    /// All names concatenated without a separator
    pub fn display_name(&self) -> String {
        self.names.concat()
    }
}

/// CPU counters in nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuUsage {
    pub user_ns: u64,
    pub kernel_ns: u64,
    pub throttled_ns: u64,
}

/// Counters for a single network interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkUsage {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

impl NetworkUsage {
    pub fn dropped(&self) -> u64 {
        self.rx_dropped.saturating_add(self.tx_dropped)
    }

    pub fn errors(&self) -> u64 {
        self.rx_errors.saturating_add(self.tx_errors)
    }
}

/// One container's resource usage for a single gather cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageReport {
    pub cpu: CpuUsage,
    pub memory_used_bytes: u64,
    pub networks: BTreeMap<String, NetworkUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsResponse {
    cpu_stats: Option<CpuStats>,
    memory_stats: Option<MemoryStats>,
    networks: Option<BTreeMap<String, Option<NetworkUsage>>>,
}

#[derive(Debug, Default, Deserialize)]
struct CpuStats {
    cpu_usage: Option<CpuCounters>,
    throttling_data: Option<ThrottlingData>,
}

#[derive(Debug, Default, Deserialize)]
struct CpuCounters {
    usage_in_usermode: Option<u64>,
    usage_in_kernelmode: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ThrottlingData {
    throttled_time: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryStats {
    usage: Option<u64>,
}

impl UsageReport {
    /// Parse the Docker stats JSON body. Missing or null sections read as zero.
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let resp: StatsResponse = serde_json::from_slice(raw)?;

        let cpu_stats = resp.cpu_stats.unwrap_or_default();
        let counters = cpu_stats.cpu_usage.unwrap_or_default();
        let throttling = cpu_stats.throttling_data.unwrap_or_default();

        Ok(Self {
            cpu: CpuUsage {
                user_ns: counters.usage_in_usermode.unwrap_or_default(),
                kernel_ns: counters.usage_in_kernelmode.unwrap_or_default(),
                throttled_ns: throttling.throttled_time.unwrap_or_default(),
            },
            memory_used_bytes: resp
                .memory_stats
                .and_then(|m| m.usage)
                .unwrap_or_default(),
            networks: resp
                .networks
                .unwrap_or_default()
                .into_iter()
                .map(|(iface, usage)| (iface, usage.unwrap_or_default()))
                .collect(),
        })
    }
}
