//! Bootstrap error types for Switchyard Core.
//!
//! Request-path failures use [`switchyard_types::GatewayError`]; this type
//! covers startup work such as reading config and connecting the store.

use serde::Serialize;
use thiserror::Error;

use crate::modules::repository::StoreError;

/// Error raised while assembling or administering the gateway.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics recorder could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Provider reload failed or timed out.
    #[error("Reload error: {0}")]
    Reload(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for bootstrap operations.
pub type AppResult<T> = Result<T, AppError>;
