//! Gateway configuration tree.

mod gateway;
mod resilience;

pub use gateway::{Credential, GatewayConfig, LoggingConfig, QuotaSettings, ReloadSettings};
pub use resilience::{BreakerSettings, HealthSettings, RetrySettings};
