//! Scrape-time metric gatherers
//!
//! A gatherer declares its instruments once, at registration, and refreshes
//! them every time the pull endpoint is scraped. `StatsGatherer` is the
//! per-container resource usage gatherer backed by the runtime stats API.

mod stats;


pub use stats::StatsGatherer;

use async_trait::async_trait;
use prometheus::core::Collector;

#[async_trait]
pub trait Gatherer: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Instruments owned by this gatherer, handed to the registry once
    fn metrics(&self) -> Vec<Box<dyn Collector>>;

    /// Refresh the owned instruments. Failures degrade the data, never the
    /// scrape, so nothing is returned.
    async fn gather(&self);
}
