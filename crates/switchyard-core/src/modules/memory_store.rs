//! In-process implementation of the gateway store.
//!
//! Backs tests and single-node deployments that configure providers in code.

use crate::modules::repository::{GatewayStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use switchyard_types::models::{ModelConfig, NewUserQuota, ProviderConfig, QuotaTier, UserQuota};

/// Memory-backed gateway store.
pub struct MemoryStore {
    providers: RwLock<HashMap<String, ProviderConfig>>,
    models: RwLock<HashMap<String, ModelConfig>>,
    tiers: RwLock<HashMap<String, QuotaTier>>,
    quotas: RwLock<HashMap<String, UserQuota>>,
    failing: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store seeded with the default quota tiers.
    pub fn new() -> Self {
        let tiers = QuotaTier::defaults().into_iter().map(|t| (t.tier.clone(), t)).collect();
        Self {
            providers: RwLock::new(HashMap::new()),
            models: RwLock::new(HashMap::new()),
            tiers: RwLock::new(tiers),
            quotas: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn upsert_provider(&self, provider: ProviderConfig) {
        self.providers.write().insert(provider.name.clone(), provider);
    }

    pub fn upsert_model(&self, model: ModelConfig) {
        self.models.write().insert(model.model.clone(), model);
    }

    pub fn remove_provider(&self, name: &str) {
        self.providers.write().remove(name);
    }

    pub fn upsert_tier(&self, tier: QuotaTier) {
        self.tiers.write().insert(tier.tier.clone(), tier);
    }

    pub fn set_user_quota(&self, quota: UserQuota) {
        self.quotas.write().insert(quota.uid.clone(), quota);
    }

    /// Snapshot of a user's row, bypassing the failure switch.
    pub fn user_quota(&self, uid: &str) -> Option<UserQuota> {
        self.quotas.read().get(uid).cloned()
    }

    /// Make every store call fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn list_active_providers(&self) -> StoreResult<Vec<ProviderConfig>> {
        self.check_available()?;
        let mut providers: Vec<ProviderConfig> =
            self.providers.read().values().filter(|p| p.is_active()).cloned().collect();
        providers.sort_by(|a, b| a.sort.cmp(&b.sort).then_with(|| a.name.cmp(&b.name)));
        Ok(providers)
    }

    async fn list_active_models(&self) -> StoreResult<Vec<ModelConfig>> {
        self.check_available()?;
        let mut models: Vec<ModelConfig> =
            self.models.read().values().filter(|m| m.is_active()).cloned().collect();
        models.sort_by(|a, b| a.sort.cmp(&b.sort).then_with(|| a.model.cmp(&b.model)));
        Ok(models)
    }

    async fn get_user_quota(&self, uid: &str) -> StoreResult<Option<UserQuota>> {
        self.check_available()?;
        Ok(self.quotas.read().get(uid).cloned())
    }

    async fn create_user_quota(&self, uid: &str, quota: NewUserQuota) -> StoreResult<UserQuota> {
        self.check_available()?;
        let mut quotas = self.quotas.write();
        let row = quotas.entry(uid.to_string()).or_insert_with(|| UserQuota {
            uid: uid.to_string(),
            tier: quota.tier,
            rpm: quota.rpm,
            tpd: quota.tpd,
            used_tokens_today: 0,
            last_reset_at: None,
        });
        Ok(row.clone())
    }

    async fn increment_used_tokens(&self, uid: &str, delta: i64) -> StoreResult<()> {
        self.check_available()?;
        let mut quotas = self.quotas.write();
        let row = quotas.get_mut(uid).ok_or_else(|| StoreError::NotFound(uid.to_string()))?;
        row.used_tokens_today = row.used_tokens_today.saturating_add(delta);
        Ok(())
    }

    async fn reset_daily_tokens(&self, uid: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_available()?;
        let mut quotas = self.quotas.write();
        let row = quotas.get_mut(uid).ok_or_else(|| StoreError::NotFound(uid.to_string()))?;
        row.used_tokens_today = 0;
        row.last_reset_at = Some(at);
        Ok(())
    }

    async fn get_quota_tier(&self, tier: &str) -> StoreResult<Option<QuotaTier>> {
        self.check_available()?;
        Ok(self.tiers.read().get(tier).cloned())
    }
}
