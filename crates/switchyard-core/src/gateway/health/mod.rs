//! Periodic provider health probing.
//!
//! Every interval each registered provider receives a tiny chat request. The
//! outcome lands in a shared map that admin surfaces read, and optionally in
//! the provider's circuit breaker.

mod types;


pub use types::{is_provider_available_error, HealthStatus, ProviderHealth};

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::models::HealthSettings;
use switchyard_types::{ChatRequest, GatewayError, Message};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::circuit_breaker::CircuitBreakerSet;
use crate::gateway::provider::Provider;
use crate::gateway::registry::ProviderRegistry;
use crate::gateway::task::BackgroundTask;

/// Model id used when a provider advertises none.
pub const PROBE_FALLBACK_MODEL: &str = "health-probe";
const PROBE_PROMPT: &str = "hi";
const PROBE_MAX_TOKENS: u32 = 5;
const PROBE_UID: &str = "health-prober";

pub struct HealthProber {
    registry: Arc<ProviderRegistry>,
    breakers: Option<Arc<CircuitBreakerSet>>,
    settings: HealthSettings,
    health: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthProber {
    pub fn new(registry: Arc<ProviderRegistry>, settings: HealthSettings) -> Self {
        Self { registry, breakers: None, settings, health: RwLock::new(HashMap::new()) }
    }

    /// Also report probe outcomes to these breakers when enabled in settings.
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerSet>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.settings.interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.probe_timeout_secs.max(1))
    }

    /// Spawn the probe loop. The first round runs immediately.
    pub fn start(self: &Arc<Self>, parent: &CancellationToken) -> BackgroundTask {
        let prober = Arc::clone(self);
        BackgroundTask::spawn("health-prober", parent, move |cancel| async move {
            info!(interval_secs = prober.interval().as_secs(), "Starting provider health prober");
            let mut ticker = tokio::time::interval(prober.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => prober.check_all(&cancel).await,
                }
            }
            info!("Provider health prober stopped");
        })
    }

    /// Probe every provider in the current registry snapshot once.
    pub async fn check_all(&self, cancel: &CancellationToken) {
        let snapshot = self.registry.snapshot();
        for name in snapshot.names() {
            if cancel.is_cancelled() {
                return;
            }
            let Some(provider) = snapshot.get(&name) else {
                continue;
            };
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                outcome = self.probe(provider.as_ref()) => outcome,
            };
            self.record(&name, outcome);
        }
    }

    /// All known records, copied out of the shared map.
    pub fn get_health(&self) -> HashMap<String, ProviderHealth> {
        self.health.read().clone()
    }

    /// One provider's record, `Unknown` if it was never probed.
    pub fn get_provider_health(&self, name: &str) -> ProviderHealth {
        self.health.read().get(name).cloned().unwrap_or_else(|| ProviderHealth::unknown(name))
    }

    async fn probe(&self, provider: &dyn Provider) -> Result<(), GatewayError> {
        let model = provider
            .models()
            .first()
            .map_or_else(|| PROBE_FALLBACK_MODEL.to_string(), |m| m.id.clone());
        let mut req = ChatRequest::new(model, PROBE_UID, vec![Message::user(PROBE_PROMPT)]);
        req.max_tokens = Some(PROBE_MAX_TOKENS);

        let timeout = self.probe_timeout();
        match tokio::time::timeout(timeout, provider.chat(&req)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) if is_provider_available_error(&err.to_string()) => {
                debug!(provider = %provider.name(), error = %err, "Probe rejected but provider reachable");
                Ok(())
            },
            Ok(Err(err)) => Err(err),
            Err(_) => Err(GatewayError::Timeout { duration_ms: timeout.as_millis() as u64 }),
        }
    }

    fn record(&self, name: &str, outcome: Result<(), GatewayError>) {
        let (status, last_error) = match &outcome {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(err) => {
                warn!(provider = %name, error = %err, "Provider health check failed");
                (HealthStatus::Unhealthy, Some(err.to_string()))
            },
        };

        self.health.write().insert(
            name.to_string(),
            ProviderHealth {
                provider_name: name.to_string(),
                status,
                last_check: Some(Utc::now()),
                last_error,
            },
        );

        if !self.settings.feed_circuit_breaker {
            return;
        }
        if let Some(breakers) = &self.breakers {
            let breaker = breakers.get(name);
            match &outcome {
                Ok(()) => breaker.record_success(),
                Err(err) => breaker.record_failure(err),
            }
        }
    }
}
