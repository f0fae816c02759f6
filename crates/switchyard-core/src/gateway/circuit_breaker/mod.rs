//! Circuit Breaker implementation for provider-level fast-fail behavior
//!
//! When a provider experiences multiple consecutive failures, its breaker
//! opens and subsequent calls fail fast without contacting upstream.
//!
//! States:
//! - Closed: Normal operation, requests pass through
//! - Open: Provider is failing, requests fail immediately
//! - Half-Open: Testing if provider has recovered

mod state;

#[cfg(test)]
mod tests;

use state::BreakerCore;
pub use state::{CircuitBreakerConfig, CircuitBreakerSummary, CircuitSnapshot, CircuitState};

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchyard_types::GatewayError;
use tracing::{debug, info, warn};

use crate::gateway::prometheus;

/// Breaker guarding a single provider
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    config: CircuitBreakerConfig,
    core: Mutex<BreakerCore>,
    trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            core: Mutex::new(BreakerCore::new()),
            trips: AtomicU64::new(0),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Whether a call may proceed right now.
    ///
    /// An Open breaker whose timeout has elapsed moves to HalfOpen and admits
    /// the call.
    pub fn allow(&self) -> Result<(), GatewayError> {
        let mut core = self.core.lock();
        match core.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                if core.last_transition.elapsed() >= self.config.open_timeout {
                    let previous = core.transition(CircuitState::HalfOpen);
                    debug!(provider = %self.provider, "Circuit breaker transitioning to half-open");
                    self.on_state_change(previous, CircuitState::HalfOpen, "open timeout elapsed");
                    return Ok(());
                }
                prometheus::record_circuit_rejection(&self.provider);
                Err(GatewayError::CircuitOpen { provider: self.provider.clone() })
            },
        }
    }

    pub fn record_success(&self) {
        let mut core = self.core.lock();
        match core.state {
            CircuitState::Closed => {
                core.failures = 0;
            },
            CircuitState::HalfOpen => {
                core.successes += 1;
                if core.successes >= self.config.success_threshold {
                    info!(provider = %self.provider, "Circuit breaker closing - provider recovered");
                    let previous = core.transition(CircuitState::Closed);
                    core.last_failure_reason = None;
                    self.on_state_change(previous, CircuitState::Closed, "provider recovered");
                }
            },
            CircuitState::Open => {
                debug!(provider = %self.provider, "Unexpected success in open state");
            },
        }
    }

    pub fn record_failure(&self, err: &GatewayError) {
        let reason = err.to_string();
        let mut core = self.core.lock();
        core.last_failure_reason = Some(reason.clone());

        match core.state {
            CircuitState::Closed => {
                core.failures += 1;
                if core.failures >= self.config.max_failures {
                    warn!(
                        provider = %self.provider,
                        failures = core.failures,
                        reason = %reason,
                        "Circuit breaker opening - too many failures"
                    );
                    let previous = core.transition(CircuitState::Open);
                    self.trips.fetch_add(1, Ordering::Relaxed);
                    self.on_state_change(previous, CircuitState::Open, &reason);
                }
            },
            CircuitState::HalfOpen => {
                warn!(
                    provider = %self.provider,
                    reason = %reason,
                    "Circuit breaker re-opening - failure during half-open"
                );
                let previous = core.transition(CircuitState::Open);
                self.trips.fetch_add(1, Ordering::Relaxed);
                self.on_state_change(previous, CircuitState::Open, &reason);
            },
            CircuitState::Open => {},
        }
    }

    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let core = self.core.lock();
        CircuitSnapshot {
            provider: self.provider.clone(),
            state: core.state,
            failures: core.failures,
            successes: core.successes,
            last_failure_reason: core.last_failure_reason.clone(),
        }
    }

    fn on_state_change(&self, previous: CircuitState, next: CircuitState, reason: &str) {
        info!(
            provider = %self.provider,
            from = previous.as_str(),
            to = next.as_str(),
            reason = %reason,
            "Circuit breaker state change"
        );
        prometheus::update_circuit_state(&self.provider, next);
    }
}

/// Lazily created breakers, one per provider name
#[derive(Debug)]
pub struct CircuitBreakerSet {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Default for CircuitBreakerSet {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerSet {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, breakers: RwLock::new(HashMap::new()) }
    }

    /// The breaker for `provider`, created Closed on first use.
    pub fn get(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(provider) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(provider.to_string()).or_insert_with(|| {
            prometheus::update_circuit_state(provider, CircuitState::Closed);
            Arc::new(CircuitBreaker::new(provider, self.config.clone()))
        }))
    }

    /// Current state, Closed for providers never seen.
    pub fn state(&self, provider: &str) -> CircuitState {
        self.breakers.read().get(provider).map_or(CircuitState::Closed, |b| b.state())
    }

    /// Snapshots sorted by provider name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<CircuitSnapshot> =
            self.breakers.read().values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }

    pub fn summary(&self) -> CircuitBreakerSummary {
        let breakers = self.breakers.read();
        let mut summary = CircuitBreakerSummary::default();
        for breaker in breakers.values() {
            match breaker.state() {
                CircuitState::Closed => summary.closed += 1,
                CircuitState::Open => summary.open += 1,
                CircuitState::HalfOpen => summary.half_open += 1,
            }
            summary.total_trips += breaker.trips();
        }
        summary
    }
}
