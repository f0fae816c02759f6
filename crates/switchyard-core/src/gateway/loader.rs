//! Builds live provider handles from store rows and credentials.

use std::collections::HashMap;
use std::sync::Arc;
use switchyard_types::models::{Credential, GatewayConfig, ModelConfig};
use switchyard_types::GatewayError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::gateway::provider::{model_info, ProviderFactories, ProviderSpec};
use crate::gateway::registry::{ProviderRegistry, RegistrySnapshot};
use crate::modules::repository::GatewayStore;

pub struct ConfigLoader {
    store: Arc<dyn GatewayStore>,
    registry: Arc<ProviderRegistry>,
    factories: ProviderFactories,
    credentials: HashMap<String, Credential>,
    stream_buffer_size: usize,
    reload_lock: Mutex<()>,
}

impl ConfigLoader {
    pub fn new(
        store: Arc<dyn GatewayStore>,
        registry: Arc<ProviderRegistry>,
        factories: ProviderFactories,
        credentials: HashMap<String, Credential>,
    ) -> Self {
        Self {
            store,
            registry,
            factories,
            credentials,
            stream_buffer_size: crate::gateway::stream::DEFAULT_STREAM_BUFFER,
            reload_lock: Mutex::new(()),
        }
    }

    /// Loader wired with the credentials and stream sizing from `config`.
    pub fn from_config(
        store: Arc<dyn GatewayStore>,
        registry: Arc<ProviderRegistry>,
        factories: ProviderFactories,
        config: &GatewayConfig,
    ) -> Self {
        let mut loader = Self::new(store, registry, factories, config.credentials.clone());
        loader.stream_buffer_size = config.stream_buffer_size;
        loader
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Register every active provider that has a credential, keeping
    /// providers already in the registry. Returns how many were registered.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<usize, GatewayError> {
        let snapshot = self.locked_snapshot(cancel).await?;
        let count = snapshot.len();
        self.registry.extend(snapshot.names().iter().filter_map(|name| snapshot.get(name)));
        Ok(count)
    }

    /// Rebuild the provider set from scratch and swap it in whole.
    ///
    /// On store failure or cancellation the current set stays live.
    pub async fn reload(&self, cancel: &CancellationToken) -> Result<usize, GatewayError> {
        let snapshot = self.locked_snapshot(cancel).await?;
        let count = snapshot.len();
        self.registry.replace(snapshot);
        info!(providers = count, "Provider registry reloaded");
        Ok(count)
    }

    /// Build a snapshot under the reload lock. Waiting for the lock and the
    /// store reads both stop at `cancel`; nothing is published until the
    /// caller swaps the result in.
    async fn locked_snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RegistrySnapshot, GatewayError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GatewayError::Cancelled),
            snapshot = async {
                let _guard = self.reload_lock.lock().await;
                self.build_snapshot().await
            } => snapshot,
        }
    }

    async fn build_snapshot(&self) -> Result<RegistrySnapshot, GatewayError> {
        let providers = self.store.list_active_providers().await?;
        let models = self.store.list_active_models().await?;
        let mut by_provider = group_models_by_provider(models);

        let mut snapshot = RegistrySnapshot::new();
        for provider in providers {
            let Some(credential) = self.credentials.get(&provider.name) else {
                warn!(provider = %provider.name, "Provider has no credential, skipping");
                continue;
            };
            let models = by_provider.remove(&provider.name).unwrap_or_default();
            let spec = ProviderSpec {
                name: provider.name.clone(),
                credential: credential.clone(),
                models: models.iter().map(model_info).collect(),
                stream_buffer_size: self.stream_buffer_size,
            };

            match self.factories.build(spec) {
                Some(Ok(handle)) => {
                    info!(provider = %provider.name, models = models.len(), "Provider loaded");
                    snapshot.insert(handle);
                },
                Some(Err(e)) => {
                    error!(provider = %provider.name, error = %e, "Failed to construct provider");
                },
                None => {
                    warn!(provider = %provider.name, "No constructor for provider vendor, skipping");
                },
            }
        }
        Ok(snapshot)
    }
}

fn group_models_by_provider(models: Vec<ModelConfig>) -> HashMap<String, Vec<ModelConfig>> {
    let mut grouped: HashMap<String, Vec<ModelConfig>> = HashMap::new();
    for model in models {
        grouped.entry(model.provider_name.clone()).or_default().push(model);
    }
    grouped
}
