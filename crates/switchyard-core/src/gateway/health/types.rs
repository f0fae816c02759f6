//! Provider health record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of the most recent probe against a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Never probed
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider_name: String,
    pub status: HealthStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProviderHealth {
    pub fn unknown(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            status: HealthStatus::Unknown,
            last_check: None,
            last_error: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Error fragments meaning the upstream answered but refused the probe's
/// model or content.
///
/// This is a permissive heuristic: a provider whose configured models are all
/// wrong still reports healthy.
const PROVIDER_AVAILABLE_MARKERS: &[&str] = &["model not found", "invalid_model", "404"];

/// Whether a probe error still proves the provider is reachable.
pub fn is_provider_available_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    PROVIDER_AVAILABLE_MARKERS.iter().any(|marker| lower.contains(marker))
}
