//! Quota data models.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

pub const QUOTA_TIER_FREE: &str = "free";
pub const QUOTA_TIER_PRO: &str = "pro";
pub const QUOTA_TIER_ENTERPRISE: &str = "enterprise";

/// Named bundle of default limits, used when a user has no override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaTier {
    pub tier: String,
    pub display_name: String,
    /// Requests per minute
    pub rpm: u32,
    /// Tokens per day
    pub tpd: i64,
}

impl QuotaTier {
    /// The tiers every fresh store is seeded with.
    pub fn defaults() -> Vec<QuotaTier> {
        vec![
            QuotaTier {
                tier: QUOTA_TIER_FREE.to_string(),
                display_name: "Free Tier".to_string(),
                rpm: 10,
                tpd: 100_000,
            },
            QuotaTier {
                tier: QUOTA_TIER_PRO.to_string(),
                display_name: "Pro Tier".to_string(),
                rpm: 60,
                tpd: 1_000_000,
            },
            QuotaTier {
                tier: QUOTA_TIER_ENTERPRISE.to_string(),
                display_name: "Enterprise Tier".to_string(),
                rpm: 300,
                tpd: 10_000_000,
            },
        ]
    }
}

/// Per-user quota tracking row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserQuota {
    pub uid: String,
    pub tier: String,
    /// Requests-per-minute override (0 = use tier)
    pub rpm: u32,
    /// Tokens-per-day override (0 = use tier)
    pub tpd: i64,
    pub used_tokens_today: i64,
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl UserQuota {
    /// Whether the stored usage belongs to a different calendar day than `now`.
    ///
    /// A record that was never reset always needs one.
    pub fn needs_daily_reset(&self, now: DateTime<Utc>) -> bool {
        match self.last_reset_at {
            None => true,
            Some(last) => last.year() != now.year() || last.ordinal() != now.ordinal(),
        }
    }
}

/// Defaults for a lazily created quota row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUserQuota {
    pub tier: String,
    pub rpm: u32,
    pub tpd: i64,
}

impl Default for NewUserQuota {
    fn default() -> Self {
        Self { tier: QUOTA_TIER_FREE.to_string(), rpm: 0, tpd: 0 }
    }
}
