//! Provider adapter contract and constructor registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use switchyard_types::models::{Credential, ModelConfig};
use switchyard_types::{ChatRequest, ChatResponse, GatewayError, ModelInfo};

use crate::gateway::stream::ChatStream;

/// Uniform contract every vendor adapter implements.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key; matches the provider row's name.
    fn name(&self) -> &str;

    /// Models this provider serves.
    fn models(&self) -> &[ModelInfo];

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError>;

    async fn chat_stream(&self, req: &ChatRequest) -> Result<ChatStream, GatewayError>;

    fn serves(&self, model: &str) -> bool {
        self.models().iter().any(|m| m.id == model)
    }
}

/// Everything a constructor needs to build one adapter instance.
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub credential: Credential,
    pub models: Vec<ModelInfo>,
    /// Channel capacity for streams this adapter opens
    pub stream_buffer_size: usize,
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("credential", &self.credential)
            .field("models", &self.models.len())
            .finish()
    }
}

impl ProviderSpec {
    /// Vendor key used to pick a constructor.
    pub fn vendor(&self) -> &str {
        self.credential.vendor.as_deref().unwrap_or(&self.name)
    }
}

/// Convert a model row to the metadata a provider advertises.
pub fn model_info(model: &ModelConfig) -> ModelInfo {
    ModelInfo {
        id: model.model.clone(),
        name: model.display_name.clone(),
        provider: model.provider_name.clone(),
        max_tokens: model.max_tokens,
        input_price: model.input_price,
        output_price: model.output_price,
    }
}

pub type ProviderConstructor =
    Arc<dyn Fn(ProviderSpec) -> Result<Arc<dyn Provider>, GatewayError> + Send + Sync>;

/// Vendor key to adapter constructor.
#[derive(Clone, Default)]
pub struct ProviderFactories {
    constructors: HashMap<String, ProviderConstructor>,
    default_vendor: Option<String>,
}

impl fmt::Debug for ProviderFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut vendors: Vec<&String> = self.constructors.keys().collect();
        vendors.sort();
        f.debug_struct("ProviderFactories")
            .field("vendors", &vendors)
            .field("default_vendor", &self.default_vendor)
            .finish()
    }
}

impl ProviderFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vendor used when a provider's own vendor has no constructor.
    pub fn with_default_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.default_vendor = Some(vendor.into());
        self
    }

    pub fn register<F>(&mut self, vendor: impl Into<String>, constructor: F)
    where
        F: Fn(ProviderSpec) -> Result<Arc<dyn Provider>, GatewayError> + Send + Sync + 'static,
    {
        self.constructors.insert(vendor.into(), Arc::new(constructor));
    }

    pub fn contains(&self, vendor: &str) -> bool {
        self.constructors.contains_key(vendor)
    }

    /// Build an adapter, or `None` when neither the vendor nor the default has a constructor.
    pub fn build(&self, spec: ProviderSpec) -> Option<Result<Arc<dyn Provider>, GatewayError>> {
        let constructor = self.constructors.get(spec.vendor()).or_else(|| {
            self.default_vendor.as_deref().and_then(|vendor| self.constructors.get(vendor))
        })?;
        Some(constructor(spec))
    }
}
