//! Daily token quota and per-minute request gate.
//!
//! Limits resolve in order: per-user override, tier default, configured
//! default, hardcoded fallback. A zero at any level means "unset".

mod rpm;


pub use rpm::{RateLimitInfo, RpmLimiter};

use std::sync::Arc;
use switchyard_types::models::{NewUserQuota, QuotaSettings, UserQuota};
use switchyard_types::GatewayError;
use tracing::{debug, warn};

use crate::gateway::clock::{Clock, SystemClock};
use crate::gateway::prometheus;
use crate::modules::repository::GatewayStore;

/// Used when neither user, tier, nor config sets a daily token limit.
pub const FALLBACK_TPD: i64 = 100_000;

/// Used when neither user, tier, nor config sets a per-minute limit.
pub const FALLBACK_RPM: u32 = 10;

pub struct QuotaChecker {
    store: Arc<dyn GatewayStore>,
    settings: QuotaSettings,
    clock: Arc<dyn Clock>,
    limiter: RpmLimiter,
}

impl QuotaChecker {
    pub fn new(store: Arc<dyn GatewayStore>, settings: QuotaSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn GatewayStore>,
        settings: QuotaSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, settings, clock, limiter: RpmLimiter::new() }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn limiter(&self) -> &RpmLimiter {
        &self.limiter
    }

    /// Reject the request if the user has spent today's token budget.
    ///
    /// Creates the user's record on first sight and zeroes yesterday's usage
    /// before comparing.
    pub async fn check_tpd(&self, uid: &str) -> Result<(), GatewayError> {
        if !self.settings.enabled {
            return Ok(());
        }
        prometheus::record_quota_operation("check");

        let mut quota = self.load_or_create(uid).await?;
        let now = self.clock.now();
        if quota.needs_daily_reset(now) {
            debug!(uid = %uid, last_reset_at = ?quota.last_reset_at, "Resetting daily token usage");
            self.store.reset_daily_tokens(uid, now).await?;
            prometheus::record_quota_operation("reset");
            quota.used_tokens_today = 0;
            quota.last_reset_at = Some(now);
        }

        let limit = self.effective_tpd(&quota).await?;
        if quota.used_tokens_today >= limit {
            debug!(uid = %uid, used = quota.used_tokens_today, limit, "Daily token quota exceeded");
            return Err(GatewayError::QuotaExceeded { used: quota.used_tokens_today, limit });
        }
        Ok(())
    }

    /// Add consumed tokens to today's usage.
    pub async fn update_tpd(&self, uid: &str, tokens: i64) -> Result<(), GatewayError> {
        if !self.settings.enabled || tokens <= 0 {
            return Ok(());
        }
        prometheus::record_quota_operation("update");

        // The record normally exists from check_tpd; recreate it if it was removed since.
        if self.store.get_user_quota(uid).await?.is_none() {
            self.store.create_user_quota(uid, NewUserQuota::default()).await?;
        }
        self.store.increment_used_tokens(uid, tokens).await?;
        Ok(())
    }

    /// Take one request slot from the user's per-minute budget.
    pub async fn check_rpm(&self, uid: &str) -> Result<RateLimitInfo, GatewayError> {
        if !self.settings.enabled {
            return Ok(RateLimitInfo { limit: 0, remaining: 0, reset_after_secs: 0 });
        }
        let quota = self.load_or_create(uid).await?;
        let limit = self.effective_rpm(&quota).await?;

        self.limiter.try_acquire(uid, limit).map_err(|info| {
            warn!(uid = %uid, limit = info.limit, "RPM limit exceeded");
            prometheus::record_rpm_rejection();
            GatewayError::RateLimited {
                limit: info.limit,
                remaining: info.remaining,
                reset_after_secs: info.reset_after_secs,
            }
        })
    }

    /// Daily token limit for a user record.
    pub async fn effective_tpd(&self, quota: &UserQuota) -> Result<i64, GatewayError> {
        if quota.tpd > 0 {
            return Ok(quota.tpd);
        }
        if let Some(tier) = self.store.get_quota_tier(&quota.tier).await? {
            if tier.tpd > 0 {
                return Ok(tier.tpd);
            }
        }
        if self.settings.default_tpd > 0 {
            return Ok(self.settings.default_tpd);
        }
        Ok(FALLBACK_TPD)
    }

    /// Per-minute request limit for a user record.
    pub async fn effective_rpm(&self, quota: &UserQuota) -> Result<u32, GatewayError> {
        if quota.rpm > 0 {
            return Ok(quota.rpm);
        }
        if let Some(tier) = self.store.get_quota_tier(&quota.tier).await? {
            if tier.rpm > 0 {
                return Ok(tier.rpm);
            }
        }
        if self.settings.default_rpm > 0 {
            return Ok(self.settings.default_rpm);
        }
        Ok(FALLBACK_RPM)
    }

    async fn load_or_create(&self, uid: &str) -> Result<UserQuota, GatewayError> {
        if let Some(quota) = self.store.get_user_quota(uid).await? {
            return Ok(quota);
        }
        debug!(uid = %uid, "Creating default quota record");
        Ok(self.store.create_user_quota(uid, NewUserQuota::default()).await?)
    }
}
