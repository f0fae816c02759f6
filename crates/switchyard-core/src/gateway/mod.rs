//! Resilient request routing across AI chat providers.

pub mod chat;
pub mod circuit_breaker;
pub mod clock;
pub mod fallback;
pub mod health;
pub mod loader;
pub mod prometheus;
pub mod provider;
pub mod quota;
pub mod registry;
pub mod reload;
pub mod retry;
pub mod service;
pub mod stream;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::ChatGateway;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSet, CircuitState};
pub use fallback::FallbackSelector;
pub use health::{HealthProber, HealthStatus, ProviderHealth};
pub use loader::ConfigLoader;
pub use provider::{Provider, ProviderFactories, ProviderSpec};
pub use quota::{QuotaChecker, RateLimitInfo};
pub use registry::{ProviderRegistry, RegistrySnapshot};
pub use reload::{trigger_reload, LocalBus, PgNotifyBus, ReloadBus, ReloadNotifier};
pub use retry::{RetryExecutor, RetryPolicy};
pub use service::GatewayService;
pub use stream::{ChatStream, StreamSender};
pub use task::BackgroundTask;
