//! Circuit breaker state types and configuration

use serde::Serialize;
use std::time::Duration;
use switchyard_types::models::BreakerSettings;
use tokio::time::Instant;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub max_failures: u32,
    /// Duration to keep circuit open before trying half-open
    pub open_timeout: Duration,
    /// Number of successful requests in half-open state to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { max_failures: 5, open_timeout: Duration::from_secs(60), success_threshold: 2 }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            max_failures: settings.max_failures,
            open_timeout: Duration::from_secs(settings.open_timeout_secs),
            success_threshold: settings.success_threshold,
        }
    }
}

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Provider is failing - requests fail immediately
    Open,
    /// Testing recovery - requests pass, outcomes decide the next state
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Mutable breaker state guarded by the breaker's mutex
#[derive(Debug)]
pub(crate) struct BreakerCore {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_transition: Instant,
    pub last_failure_reason: Option<String>,
}

impl BreakerCore {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_transition: Instant::now(),
            last_failure_reason: None,
        }
    }

    /// Move to `next`, zeroing both counters.
    pub fn transition(&mut self, next: CircuitState) -> CircuitState {
        let previous = self.state;
        self.state = next;
        self.failures = 0;
        self.successes = 0;
        self.last_transition = Instant::now();
        previous
    }
}

/// Point-in-time view of one provider's breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure_reason: Option<String>,
}

/// Summary of circuit breaker states across all providers
#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitBreakerSummary {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    pub total_trips: u64,
}
