//! Runtime event supervision
//!
//! Keeps a subscription to the runtime's event stream open for the whole
//! process lifetime. Stream errors and stream closure end the current
//! subscription; after a fixed backoff a new one is opened. Only lifetime
//! cancellation stops the loop.

use crate::health::{components, HealthRegistry};
use crate::models::{NormalizedEvent, RuntimeEvent};
use crate::registry::MetricRegistry;
use crate::runtime::RuntimeClient;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

pub const CONTAINER_EVENT_TYPE: &str = "container";
pub const OOM_ACTION: &str = "oom";

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Wait between a failed subscription and the next attempt (default: 1 second)
    pub reconnect_backoff: Duration,
    /// Consecutive attempts without a delivered event before the event
    /// stream is reported unhealthy (default: 5)
    pub unhealthy_after_failures: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(1),
            unhealthy_after_failures: 5,
        }
    }
}

/// Why a subscription attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenOutcome {
    StreamError,
    StreamClosed,
    Cancelled,
}

pub struct EventSupervisor {
    client: Arc<dyn RuntimeClient>,
    registry: Arc<MetricRegistry>,
    health: HealthRegistry,
    config: SupervisorConfig,
}

impl EventSupervisor {
    pub fn new(
        client: Arc<dyn RuntimeClient>,
        registry: Arc<MetricRegistry>,
        health: HealthRegistry,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            client,
            registry,
            health,
            config,
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            backoff_ms = self.config.reconnect_backoff.as_millis() as u64,
            "Starting event supervisor"
        );

        let mut failures: u32 = 0;
        loop {
            let attempt = shutdown.child_token();
            let (outcome, delivered) = self.listen(&attempt).await;
            attempt.cancel();

            if outcome == ListenOutcome::Cancelled || shutdown.is_cancelled() {
                break;
            }

            failures = if delivered { 1 } else { failures.saturating_add(1) };
            if failures >= self.config.unhealthy_after_failures {
                self.health
                    .set_unhealthy(
                        components::EVENT_STREAM,
                        format!("event stream down after {failures} attempts"),
                    )
                    .await;
            } else {
                self.health
                    .set_degraded(components::EVENT_STREAM, "event stream reconnecting")
                    .await;
            }
            self.registry.record_reconnect();
            warn!(
                reason = ?outcome,
                failures,
                backoff_ms = self.config.reconnect_backoff.as_millis() as u64,
                "Event stream lost, reconnecting after backoff"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_backoff) => {}
            }
        }

        info!("Event supervisor stopped");
    }

    /// One subscription attempt. Also reports whether any event arrived,
    /// which is the only proof the subscription actually connected.
    async fn listen(&self, attempt: &CancellationToken) -> (ListenOutcome, bool) {
        info!("Subscribing to runtime events");
        let mut events = self.client.subscribe_events(attempt.clone());
        let mut delivered = false;

        loop {
            let outcome = tokio::select! {
                _ = attempt.cancelled() => ListenOutcome::Cancelled,
                item = events.next() => match item {
                    Some(Ok(event)) => {
                        if !delivered {
                            delivered = true;
                            self.health.set_healthy(components::EVENT_STREAM).await;
                        }
                        self.handle_event(&event);
                        continue;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Event stream error");
                        ListenOutcome::StreamError
                    }
                    None => {
                        warn!("Event stream closed");
                        ListenOutcome::StreamClosed
                    }
                },
            };
            return (outcome, delivered);
        }
    }

    fn handle_event(&self, event: &RuntimeEvent) {
        if event.kind != CONTAINER_EVENT_TYPE || event.action != OOM_ACTION {
            trace!(kind = %event.kind, action = %event.action, "Ignoring event");
            return;
        }

        let normalized = NormalizedEvent::from_event(event);
        warn!(
            event = "container_oom",
            container_id = %event.actor_id,
            container_name = %normalized.container_name,
            service_name = %normalized.service_name,
            service_id = %normalized.service_id,
            "Container killed by OOM"
        );
        self.registry.register_event(
            &normalized.service_name,
            &normalized.service_id,
            &normalized.event_type,
        );
    }
}
