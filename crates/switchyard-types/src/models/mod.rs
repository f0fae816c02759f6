//! Core domain models for Switchyard.
//!
//! Provider, model, and quota rows are owned by the persistent store and loaded
//! read-only; the gateway configuration tree is loaded once at startup.

mod config;
mod provider;
mod quota;

pub use config::{
    BreakerSettings, Credential, GatewayConfig, HealthSettings, LoggingConfig, QuotaSettings,
    ReloadSettings, RetrySettings,
};
pub use provider::{ModelConfig, ProviderConfig, RecordStatus};
pub use quota::{NewUserQuota, QuotaTier, UserQuota, QUOTA_TIER_ENTERPRISE, QUOTA_TIER_FREE, QUOTA_TIER_PRO};
