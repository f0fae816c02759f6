//! Top-level gateway configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use validator::Validate;

use super::resilience::{BreakerSettings, HealthSettings, RetrySettings};

/// Full gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct GatewayConfig {
    /// Postgres connection string for the persistent store
    #[serde(default)]
    pub database_url: Option<String>,
    /// Model used when neither the request nor the store names one
    #[serde(default)]
    pub default_model: Option<String>,
    /// Vendor key used when a provider's vendor has no registered constructor
    #[serde(default = "default_vendor")]
    #[validate(length(min = 1_u64))]
    pub default_vendor: String,
    /// Stream channel capacity
    #[serde(default = "default_stream_buffer_size")]
    #[validate(range(min = 1_usize, max = 10_000_usize))]
    pub stream_buffer_size: usize,
    /// Provider credentials keyed by provider name
    #[serde(default)]
    pub credentials: HashMap<String, Credential>,
    #[serde(default)]
    #[validate(nested)]
    pub quota: QuotaSettings,
    #[serde(default)]
    #[validate(nested)]
    pub circuit_breaker: BreakerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetrySettings,
    #[serde(default)]
    #[validate(nested)]
    pub health: HealthSettings,
    #[serde(default)]
    #[validate(nested)]
    pub reload: ReloadSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_vendor() -> String {
    "openai".to_string()
}

fn default_stream_buffer_size() -> usize {
    100
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            default_model: None,
            default_vendor: default_vendor(),
            stream_buffer_size: default_stream_buffer_size(),
            credentials: HashMap::new(),
            quota: QuotaSettings::default(),
            circuit_breaker: BreakerSettings::default(),
            retry: RetrySettings::default(),
            health: HealthSettings::default(),
            reload: ReloadSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// API credential for one provider.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub api_key: String,
    /// Override for the vendor's API endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Adapter family ("openai", "anthropic", ...). Defaults to the provider name.
    #[serde(default)]
    pub vendor: Option<String>,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: None, vendor: None }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("vendor", &self.vendor)
            .finish()
    }
}

/// Token and request budget settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct QuotaSettings {
    /// When false, the daily token checks are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fallback tokens-per-day when neither user nor tier sets one (0 = unset)
    #[serde(default)]
    #[validate(range(min = 0_i64))]
    pub default_tpd: i64,
    /// Fallback requests-per-minute when neither user nor tier sets one (0 = unset)
    #[serde(default)]
    pub default_rpm: u32,
}

fn default_true() -> bool {
    true
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self { enabled: true, default_tpd: 0, default_rpm: 0 }
    }
}

/// Hot-reload channel settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ReloadSettings {
    /// Pub/sub channel carrying reload triggers
    #[serde(default = "default_reload_channel")]
    #[validate(length(min = 1_u64, max = 63_u64))]
    pub channel: String,
    /// Interval between polling reloads when no bus is available
    #[serde(default = "default_poll_interval")]
    #[validate(range(min = 1_u64, max = 86_400_u64))]
    pub poll_interval_secs: u64,
    /// Upper bound on a single reload
    #[serde(default = "default_reload_timeout")]
    #[validate(range(min = 1_u64, max = 600_u64))]
    pub reload_timeout_secs: u64,
}

fn default_reload_channel() -> String {
    "switchyard_reload_providers".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_reload_timeout() -> u64 {
    30
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            channel: default_reload_channel(),
            poll_interval_secs: default_poll_interval(),
            reload_timeout_secs: default_reload_timeout(),
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), ansi: true }
    }
}
