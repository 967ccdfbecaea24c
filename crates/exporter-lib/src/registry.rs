//! Metric registry for the exporter
//!
//! Owns the Prometheus registry, the event counter and the exporter's own
//! self-metrics. Gatherers register their instruments here once at startup
//! and are invoked in registration order on every scrape.

use crate::collector::Gatherer;
use crate::error::Result;
use prometheus::proto::MetricFamily;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const NAMESPACE: &str = "docker";
const SELF_NAMESPACE: &str = "docker_exporter";

/// Buckets for scrape duration (in seconds); a scrape is bounded by the
/// slowest per-container stats call
const SCRAPE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Encoded exposition output for one scrape
#[derive(Debug, Clone)]
pub struct Rendered {
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct MetricRegistry {
    registry: Registry,
    events: IntCounterVec,
    scrape_duration_seconds: Histogram,
    event_stream_reconnects: IntCounter,
    gatherers: Vec<Arc<dyn Gatherer>>,
    /// Serializes gather cycles so concurrent scrapes never interleave a
    /// gauge reset with another cycle's writes
    gather_lock: Mutex<()>,
}

impl MetricRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events = IntCounterVec::new(
            Opts::new("event_total", "Container lifecycle events.").namespace(NAMESPACE),
            &["serviceName", "serviceID", "eventType"],
        )?;
        let scrape_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "scrape_duration_seconds",
                "Time spent refreshing all gatherers for one scrape.",
            )
            .namespace(SELF_NAMESPACE)
            .buckets(SCRAPE_BUCKETS.to_vec()),
        )?;
        let event_stream_reconnects = IntCounter::with_opts(
            Opts::new(
                "event_stream_reconnects_total",
                "Number of times the runtime event subscription was re-established.",
            )
            .namespace(SELF_NAMESPACE),
        )?;

        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(event_stream_reconnects.clone()))?;

        Ok(Self {
            registry,
            events,
            scrape_duration_seconds,
            event_stream_reconnects,
            gatherers: Vec::new(),
            gather_lock: Mutex::new(()),
        })
    }

    /// Register a gatherer's instruments and schedule it on every scrape.
    ///
    /// A name collision is a wiring error; callers should treat it as fatal.
    /// On error none of the gatherer's instruments stay registered.
    pub fn register_gatherer(&mut self, gatherer: Arc<dyn Gatherer>) -> Result<()> {
        for (index, collector) in gatherer.metrics().into_iter().enumerate() {
            if let Err(e) = self.registry.register(collector) {
                for registered in gatherer.metrics().into_iter().take(index) {
                    if let Err(rollback) = self.registry.unregister(registered) {
                        warn!(
                            gatherer = gatherer.name(),
                            error = %rollback,
                            "Failed to roll back instrument"
                        );
                    }
                }
                return Err(e.into());
            }
        }
        self.gatherers.push(gatherer);
        Ok(())
    }

    pub fn register_event(&self, service_name: &str, service_id: &str, event_type: &str) {
        self.events
            .with_label_values(&[service_name, service_id, event_type])
            .inc();
    }

    pub fn record_reconnect(&self) {
        self.event_stream_reconnects.inc();
    }

    /// Refresh every gatherer in registration order, then collect
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let _cycle = self.gather_lock.lock().await;

        let start = Instant::now();
        for gatherer in &self.gatherers {
            debug!(gatherer = gatherer.name(), "Invoking gatherer");
            gatherer.gather().await;
        }
        self.scrape_duration_seconds
            .observe(start.elapsed().as_secs_f64());

        self.registry.gather()
    }

    /// Gather and encode in the Prometheus text format
    pub async fn render(&self) -> Rendered {
        let families = self.gather().await;
        let encoder = TextEncoder::new();
        let mut body = Vec::new();

        if let Err(e) = encoder.encode(&families, &mut body) {
            error!(error = %e, "Failed to encode metrics");
            body.clear();
        }

        Rendered {
            content_type: encoder.format_type().to_string(),
            body,
        }
    }
}
