//! Exporter configuration

use anyhow::Result;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Exporter configuration, read from `EXPORTER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Port of the metrics and health endpoints
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Wait before re-subscribing to the event stream, in milliseconds
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Consecutive failed event subscriptions before the event stream is
    /// reported unhealthy
    #[serde(default = "default_event_stream_unhealthy_after")]
    pub event_stream_unhealthy_after: u32,

    /// Time in-flight scrapes get to finish on shutdown, in seconds
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Timeout for Docker API requests, in seconds
    #[serde(default = "default_docker_timeout_secs")]
    pub docker_timeout_secs: u64,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

fn default_event_stream_unhealthy_after() -> u32 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_docker_timeout_secs() -> u64 {
    120
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            event_stream_unhealthy_after: default_event_stream_unhealthy_after(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            docker_timeout_secs: default_docker_timeout_secs(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("EXPORTER").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder().add_source(source).build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listen_port))
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("EXPORTER")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let config = ExporterConfig::from_source(environment(&[])).unwrap();

        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.reconnect_backoff(), Duration::from_secs(1));
        assert_eq!(config.event_stream_unhealthy_after, 5);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.docker_timeout(), Duration::from_secs(120));
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_environment_overrides() {
        let config = ExporterConfig::from_source(environment(&[
            ("EXPORTER_LISTEN_PORT", "9417"),
            ("EXPORTER_RECONNECT_BACKOFF_MS", "250"),
            ("EXPORTER_EVENT_STREAM_UNHEALTHY_AFTER", "3"),
        ]))
        .unwrap();

        assert_eq!(config.listen_port, 9417);
        assert_eq!(config.reconnect_backoff(), Duration::from_millis(250));
        assert_eq!(config.event_stream_unhealthy_after, 3);
        assert_eq!(config.shutdown_grace_secs, 5);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result =
            ExporterConfig::from_source(environment(&[("EXPORTER_LISTEN_PORT", "not-a-port")]));

        assert!(result.is_err());
    }
}
