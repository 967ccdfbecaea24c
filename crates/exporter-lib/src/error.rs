//! Error types shared across the exporter

use std::net::SocketAddr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Failure reported by a non-Docker runtime client
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("failed to decode usage report: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("runtime returned no usage report for container {0}")]
    EmptyStats(String),

    #[error("metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics server stopped unexpectedly: {0}")]
    Server(#[source] std::io::Error),
}
