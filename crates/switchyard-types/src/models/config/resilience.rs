//! Circuit breaker, retry, and health probe settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Per-provider circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct BreakerSettings {
    /// Consecutive failures that trip Closed -> Open
    #[serde(default = "default_max_failures")]
    #[validate(range(min = 1_u32, max = 1000_u32))]
    pub max_failures: u32,
    /// Seconds spent Open before a trial call is allowed
    #[serde(default = "default_open_timeout")]
    #[validate(range(min = 1_u64, max = 3600_u64))]
    pub open_timeout_secs: u64,
    /// Successes in HalfOpen needed to close again
    #[serde(default = "default_success_threshold")]
    #[validate(range(min = 1_u32, max = 100_u32))]
    pub success_threshold: u32,
}

fn default_max_failures() -> u32 {
    5
}

fn default_open_timeout() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    2
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            open_timeout_secs: default_open_timeout(),
            success_threshold: default_success_threshold(),
        }
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1_u32, max = 20_u32))]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    #[validate(range(max = 60_000_u64))]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    #[validate(range(max = 600_000_u64))]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1.0_f64, max = 10.0_f64))]
    pub multiplier: f64,
    /// Per-attempt time limit; unset means attempts are unbounded
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            attempt_timeout_secs: None,
        }
    }
}

/// Background health probe settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct HealthSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    #[validate(range(min = 1_u64, max = 86_400_u64))]
    pub interval_secs: u64,
    #[serde(default = "default_probe_timeout")]
    #[validate(range(min = 1_u64, max = 600_u64))]
    pub probe_timeout_secs: u64,
    /// Report probe outcomes to the circuit breakers
    #[serde(default = "default_true")]
    pub feed_circuit_breaker: bool,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
            probe_timeout_secs: default_probe_timeout(),
            feed_circuit_breaker: true,
        }
    }
}
