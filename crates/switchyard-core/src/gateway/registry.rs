//! Live provider registry.
//!
//! Readers load the current snapshot without locking; writers build a new
//! snapshot and swap it in whole, so a lookup never observes a half-built
//! provider set.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchyard_types::ModelInfo;

use crate::gateway::provider::Provider;

/// Immutable provider set, keyed by provider name.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl std::fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a provider under its own name.
    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// First provider (by name) advertising `model`.
    pub fn get_by_model(&self, model: &str) -> Option<Arc<dyn Provider>> {
        self.providers.values().find(|p| p.serves(model)).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn models(&self) -> Vec<ModelInfo> {
        self.providers.values().flat_map(|p| p.models().iter().cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

pub struct ProviderRegistry {
    current: ArcSwap<RegistrySnapshot>,
    write_lock: Mutex<()>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { current: ArcSwap::from_pointee(RegistrySnapshot::new()), write_lock: Mutex::new(()) }
    }

    pub fn register(&self, provider: Arc<dyn Provider>) {
        let _guard = self.write_lock.lock();
        let mut next = RegistrySnapshot::clone(&self.current.load());
        tracing::debug!(provider = %provider.name(), "Registering provider");
        next.insert(provider);
        self.current.store(Arc::new(next));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.current.load().get(name)
    }

    pub fn get_by_model(&self, model: &str) -> Option<Arc<dyn Provider>> {
        self.current.load().get_by_model(model)
    }

    pub fn list_providers(&self) -> Vec<String> {
        self.current.load().names()
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.current.load().models()
    }

    /// Swap in an empty provider set.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.current.store(Arc::new(RegistrySnapshot::new()));
    }

    /// Swap in a fully built provider set.
    pub fn replace(&self, snapshot: RegistrySnapshot) {
        let _guard = self.write_lock.lock();
        self.current.store(Arc::new(snapshot));
    }

    /// Merge providers into the current set in one swap.
    pub fn extend(&self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) {
        let _guard = self.write_lock.lock();
        let mut next = RegistrySnapshot::clone(&self.current.load());
        for provider in providers {
            next.insert(provider);
        }
        self.current.store(Arc::new(next));
    }

    /// Current provider set; stays valid even if a reload swaps it out.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }
}
