//! Gateway errors surfaced to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while routing a chat request.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum GatewayError {
    /// Request carried no messages
    #[error("Messages cannot be empty")]
    EmptyMessages,

    /// Model is unknown or no registered provider serves it
    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    /// Daily token budget exhausted
    #[error("Daily token quota exceeded ({used}/{limit})")]
    QuotaExceeded { used: i64, limit: i64 },

    /// Per-minute request budget exhausted
    #[error("Rate limit exceeded ({limit} requests/minute), resets in {reset_after_secs}s")]
    RateLimited { limit: u32, remaining: u32, reset_after_secs: u64 },

    /// Circuit breaker refused the call locally
    #[error("Circuit breaker open for {provider}")]
    CircuitOpen { provider: String },

    /// Provider returned an error
    #[error("Upstream {provider} error: {message}")]
    Upstream { provider: String, message: String },

    /// A single upstream attempt exceeded its time budget
    #[error("Request timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Primary model and its fallback both failed
    #[error("All models failed ({model} -> {fallback}): {message}")]
    AllModelsFailed { model: String, fallback: String, message: String },

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Stream was closed by its producer
    #[error("Stream closed")]
    StreamClosed,

    /// Persistent store failed
    #[error("Store error: {message}")]
    Store { message: String },

    /// Internal gateway error (bugs, unexpected states)
    #[error("Internal gateway error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Rejected before any upstream call because the request itself is bad.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyMessages | Self::ModelNotFound { .. })
    }

    /// Rejected before any upstream call because the user is over budget.
    pub fn is_quota_error(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. } | Self::RateLimited { .. })
    }

    /// The provider path failed and a fallback model may be tried.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. } | Self::CircuitOpen { .. })
    }

    /// Stable machine-readable code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyMessages => "InvalidArgument.AIEmptyMessages",
            Self::ModelNotFound { .. } => "InvalidArgument.AIModelNotFound",
            Self::QuotaExceeded { .. } | Self::RateLimited { .. } => {
                "ResourceExhausted.AIQuotaExceeded"
            },
            Self::CircuitOpen { .. } => "ServiceUnavailable.AICircuitOpen",
            Self::Upstream { .. } => "ExternalError.AIProviderError",
            Self::Timeout { .. } => "ExternalError.AIProviderTimeout",
            Self::AllModelsFailed { .. } => "ServiceUnavailable.AllModelsFailed",
            Self::Cancelled => "Cancelled.RequestCancelled",
            Self::StreamClosed => "InternalError.AIStreamClosed",
            Self::Store { .. } => "InternalError.StoreError",
            Self::Internal { .. } => "InternalError.Internal",
        }
    }

    /// Get HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::EmptyMessages | Self::ModelNotFound { .. } => 400,
            Self::QuotaExceeded { .. } | Self::RateLimited { .. } => 429,
            Self::CircuitOpen { .. } | Self::AllModelsFailed { .. } => 503,
            Self::Upstream { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Cancelled => 499,
            Self::StreamClosed | Self::Store { .. } | Self::Internal { .. } => 500,
        }
    }
}
