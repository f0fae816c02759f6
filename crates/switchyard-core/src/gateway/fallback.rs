//! Alternate model selection when the primary is unavailable.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::gateway::registry::ProviderRegistry;
use crate::modules::repository::GatewayStore;

pub struct FallbackSelector {
    store: Arc<dyn GatewayStore>,
    registry: Arc<ProviderRegistry>,
}

impl FallbackSelector {
    pub fn new(store: Arc<dyn GatewayStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self { store, registry }
    }

    /// First active model, in sort order, that allows fallback, is not
    /// `original`, and is served by the live registry.
    ///
    /// Store errors yield `None`.
    pub async fn select_fallback(&self, original: &str) -> Option<String> {
        let models = match self.store.list_active_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(model = %original, error = %e, "Failed to list models for fallback");
                return None;
            },
        };

        let snapshot = self.registry.snapshot();
        let candidate = models
            .into_iter()
            .filter(|m| m.model != original && m.allow_fallback)
            .find(|m| snapshot.get_by_model(&m.model).is_some())
            .map(|m| m.model);

        match &candidate {
            Some(fallback) => debug!(model = %original, fallback = %fallback, "Selected fallback model"),
            None => debug!(model = %original, "No fallback model available"),
        }
        candidate
    }
}
