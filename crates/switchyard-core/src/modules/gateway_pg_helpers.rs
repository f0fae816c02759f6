//! Row mapping helpers for the PostgreSQL gateway store.

use crate::modules::repository::StoreResult;
use sqlx::postgres::PgRow;
use sqlx::Row;
use switchyard_types::models::{ModelConfig, ProviderConfig, QuotaTier, RecordStatus, UserQuota};

fn non_negative_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub(crate) fn row_to_provider(row: &PgRow) -> StoreResult<ProviderConfig> {
    let status: String = row.try_get("status")?;
    Ok(ProviderConfig {
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        status: RecordStatus::from_string(&status),
        is_default: row.try_get("is_default")?,
        sort: row.try_get("sort")?,
    })
}

pub(crate) fn row_to_model(row: &PgRow) -> StoreResult<ModelConfig> {
    let status: String = row.try_get("status")?;
    let max_tokens: i32 = row.try_get("max_tokens")?;
    Ok(ModelConfig {
        model: row.try_get("model")?,
        provider_name: row.try_get("provider_name")?,
        display_name: row.try_get("display_name")?,
        max_tokens: non_negative_u32(max_tokens),
        input_price: row.try_get("input_price")?,
        output_price: row.try_get("output_price")?,
        status: RecordStatus::from_string(&status),
        is_default: row.try_get("is_default")?,
        sort: row.try_get("sort")?,
        allow_fallback: row.try_get("allow_fallback")?,
    })
}

pub(crate) fn row_to_tier(row: &PgRow) -> StoreResult<QuotaTier> {
    let rpm: i32 = row.try_get("rpm")?;
    Ok(QuotaTier {
        tier: row.try_get("tier")?,
        display_name: row.try_get("display_name")?,
        rpm: non_negative_u32(rpm),
        tpd: row.try_get("tpd")?,
    })
}

pub(crate) fn row_to_user_quota(row: &PgRow) -> StoreResult<UserQuota> {
    let rpm: i32 = row.try_get("rpm")?;
    Ok(UserQuota {
        uid: row.try_get("uid")?,
        tier: row.try_get("tier")?,
        rpm: non_negative_u32(rpm),
        tpd: row.try_get("tpd")?,
        used_tokens_today: row.try_get("used_tokens_today")?,
        last_reset_at: row.try_get("last_reset_at")?,
    })
}
