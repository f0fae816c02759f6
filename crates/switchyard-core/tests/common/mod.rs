//! Mock upstream shared by the integration suite.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use switchyard_core::gateway::provider::{Provider, ProviderFactories, ProviderSpec};
use switchyard_core::gateway::stream::{self, ChatStream};
use switchyard_core::modules::memory_store::MemoryStore;
use switchyard_types::models::{Credential, GatewayConfig, ModelConfig, ProviderConfig};
use switchyard_types::{ChatRequest, ChatResponse, GatewayError, Message, ModelInfo, StreamChunk, Usage};

/// Per-provider behavior the test can flip while the gateway runs.
#[derive(Debug, Clone)]
pub enum Behavior {
    Healthy,
    Failing(String),
}

#[derive(Default)]
pub struct MockBackend {
    behavior: DashMap<String, Behavior>,
    calls: DashMap<String, Arc<AtomicU32>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, provider: &str, behavior: Behavior) {
        self.behavior.insert(provider.to_string(), behavior);
    }

    pub fn calls(&self, provider: &str) -> u32 {
        self.calls.get(provider).map_or(0, |c| c.load(Ordering::SeqCst))
    }

    fn hit(&self, provider: &str) -> Behavior {
        self.calls
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .fetch_add(1, Ordering::SeqCst);
        self.behavior.get(provider).map_or(Behavior::Healthy, |b| b.clone())
    }

    /// Constructor table with every vendor mapped to this backend.
    pub fn factories(self: &Arc<Self>) -> ProviderFactories {
        let backend = Arc::clone(self);
        let mut factories = ProviderFactories::new();
        factories.register("openai", move |spec: ProviderSpec| {
            Ok(Arc::new(MockProvider { name: spec.name, models: spec.models, backend: Arc::clone(&backend) })
                as Arc<dyn Provider>)
        });
        factories
    }
}

pub struct MockProvider {
    name: String,
    models: Vec<ModelInfo>,
    backend: Arc<MockBackend>,
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        match self.backend.hit(&self.name) {
            Behavior::Healthy => Ok(ChatResponse::assistant(
                format!("{}-1", self.name),
                &req.model,
                format!("reply from {}", self.name),
                Usage::new(10, 5),
            )),
            Behavior::Failing(message) => {
                Err(GatewayError::Upstream { provider: self.name.clone(), message })
            },
        }
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<ChatStream, GatewayError> {
        if let Behavior::Failing(message) = self.backend.hit(&self.name) {
            return Err(GatewayError::Upstream { provider: self.name.clone(), message });
        }
        let (tx, rx) = stream::channel(8);
        let id = format!("{}-stream", self.name);
        let model = req.model.clone();
        tokio::spawn(async move {
            for word in ["streamed", "reply"] {
                if !tx.send(StreamChunk::delta(&id, &model, word)).await {
                    return;
                }
            }
            tx.send(StreamChunk::finish(&id, &model, Usage::new(6, 2))).await;
            tx.close();
        });
        Ok(rx)
    }
}

/// Store with two providers and three models:
/// `gpt-4o` (openai, sort 1), `deepseek-chat` (deepseek, sort 2),
/// `o1` (openai, sort 3, no fallback).
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.upsert_provider(ProviderConfig::new("openai", 1));
    store.upsert_provider(ProviderConfig::new("deepseek", 2));
    store.upsert_model(ModelConfig::new("gpt-4o", "openai", 1));
    store.upsert_model(ModelConfig::new("deepseek-chat", "deepseek", 2));
    store.upsert_model(ModelConfig::new("o1", "openai", 3).with_fallback(false));
    store
}

/// Fast retries, no health loop, credentials for both seeded providers.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.circuit_breaker.max_failures = 2;
    config.health.enabled = false;
    config.credentials.insert("openai".to_string(), Credential::new("sk-openai"));
    config.credentials.insert("deepseek".to_string(), Credential::new("sk-deepseek"));
    config
}

pub fn ask(model: &str, uid: &str) -> ChatRequest {
    ChatRequest::new(model, uid, vec![Message::user("ping")])
}
