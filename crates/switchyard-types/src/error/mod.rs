//! Typed error definitions for Switchyard.
//!
//! Errors are grouped by the point in a request at which they surface:
//!
//! - **Input** errors are rejected before any upstream call and never retried
//! - **Quota** errors are rejected before any upstream call and are
//!   distinguishable from provider failures
//! - **Upstream** errors come back from a provider and may be retried
//! - **Breaker** rejections are refused locally without contacting upstream

mod gateway;

pub use gateway::GatewayError;

/// Standard Result type using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
