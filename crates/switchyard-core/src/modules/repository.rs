//! Gateway store trait for storage abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use switchyard_types::models::{ModelConfig, NewUserQuota, ProviderConfig, QuotaTier, UserQuota};
use switchyard_types::GatewayError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::Store { message: err.to_string() }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Read-mostly access to provider/model rows plus quota bookkeeping.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// Active providers ordered by `sort`, then name.
    async fn list_active_providers(&self) -> StoreResult<Vec<ProviderConfig>>;
    /// Active models ordered by `sort`, then model id.
    async fn list_active_models(&self) -> StoreResult<Vec<ModelConfig>>;
    async fn get_user_quota(&self, uid: &str) -> StoreResult<Option<UserQuota>>;
    /// Insert a quota row, or return the existing one if another caller won the race.
    async fn create_user_quota(&self, uid: &str, quota: NewUserQuota) -> StoreResult<UserQuota>;
    async fn increment_used_tokens(&self, uid: &str, delta: i64) -> StoreResult<()>;
    /// Zero today's usage and stamp `last_reset_at`.
    async fn reset_daily_tokens(&self, uid: &str, at: DateTime<Utc>) -> StoreResult<()>;
    async fn get_quota_tier(&self, tier: &str) -> StoreResult<Option<QuotaTier>>;
}
