//! Request-path orchestration.
//!
//! One call runs strictly in order: validation, model resolution, RPM gate,
//! daily token check, provider lookup, breaker-guarded retries, and at most one
//! fallback pass.

mod forward;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use switchyard_types::models::GatewayConfig;
use switchyard_types::{ChatRequest, ChatResponse, GatewayError, ModelInfo};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gateway::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerSet, CircuitSnapshot};
use crate::gateway::clock::Clock;
use crate::gateway::fallback::FallbackSelector;
use crate::gateway::prometheus;
use crate::gateway::provider::Provider;
use crate::gateway::quota::QuotaChecker;
use crate::gateway::registry::ProviderRegistry;
use crate::gateway::retry::{RetryExecutor, RetryPolicy};
use crate::gateway::stream::ChatStream;
use crate::modules::repository::GatewayStore;

/// Gateway instance owning every resilience component it routes through.
pub struct ChatGateway {
    config: GatewayConfig,
    store: Arc<dyn GatewayStore>,
    registry: Arc<ProviderRegistry>,
    breakers: Arc<CircuitBreakerSet>,
    retry: RetryExecutor,
    quota: Arc<QuotaChecker>,
    fallback: FallbackSelector,
}

/// A resolved request ready to hit a provider.
struct Route {
    request_id: String,
    req: ChatRequest,
    provider: Arc<dyn Provider>,
}

impl ChatGateway {
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn GatewayStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        let quota = QuotaChecker::new(Arc::clone(&store), config.quota.clone());
        Self::assemble(config, store, registry, quota)
    }

    /// Gateway whose quota days follow `clock`.
    pub fn with_clock(
        config: GatewayConfig,
        store: Arc<dyn GatewayStore>,
        registry: Arc<ProviderRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quota = QuotaChecker::with_clock(Arc::clone(&store), config.quota.clone(), clock);
        Self::assemble(config, store, registry, quota)
    }

    fn assemble(
        config: GatewayConfig,
        store: Arc<dyn GatewayStore>,
        registry: Arc<ProviderRegistry>,
        quota: QuotaChecker,
    ) -> Self {
        let breakers =
            Arc::new(CircuitBreakerSet::new(CircuitBreakerConfig::from(&config.circuit_breaker)));
        let retry = RetryExecutor::new(RetryPolicy::from(&config.retry));
        let fallback = FallbackSelector::new(Arc::clone(&store), Arc::clone(&registry));
        Self { config, store, registry, breakers, retry, quota: Arc::new(quota), fallback }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerSet> {
        &self.breakers
    }

    pub fn quota(&self) -> &Arc<QuotaChecker> {
        &self.quota
    }

    /// Models advertised by the live registry.
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.registry.list_models()
    }

    pub fn circuit_states(&self) -> Vec<CircuitSnapshot> {
        self.breakers.snapshots()
    }

    /// Complete (non-streaming) chat.
    pub async fn chat(
        &self,
        req: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, GatewayError> {
        let route = self.route(req).await?;
        let uid = route.req.uid.clone();

        let resp = self
            .with_fallback(route, cancel, false, |provider, req| async move {
                provider.chat(&req).await
            })
            .await?;

        self.account_usage(&uid, i64::from(resp.usage.total_tokens)).await;
        Ok(resp)
    }

    /// Streaming chat.
    ///
    /// Opening the upstream stream goes through the same retry, breaker and
    /// fallback path as [`chat`](Self::chat). Once open, chunks are forwarded
    /// by a producer task; cancelling `cancel` closes the returned stream with
    /// `Cancelled`.
    pub async fn chat_stream(
        &self,
        req: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatStream, GatewayError> {
        let route = self.route(req).await?;
        let request_id = route.request_id.clone();
        let uid = route.req.uid.clone();

        let (provider, model, upstream) = self
            .with_fallback(route, cancel, true, |provider, req| async move {
                let upstream = provider.chat_stream(&req).await?;
                Ok((provider, req.model, upstream))
            })
            .await?;

        Ok(forward::spawn(forward::Forward {
            request_id,
            uid,
            model,
            provider,
            upstream,
            breakers: Arc::clone(&self.breakers),
            quota: Arc::clone(&self.quota),
            cancel: cancel.clone(),
            buffer: self.config.stream_buffer_size,
        }))
    }

    /// Validate, resolve the model, apply quota gates and find a provider.
    async fn route(&self, mut req: ChatRequest) -> Result<Route, GatewayError> {
        if req.messages.is_empty() {
            return Err(GatewayError::EmptyMessages);
        }
        req.model = self.resolve_model(&req.model).await?;
        let request_id = format!("chat-{}", Uuid::new_v4());

        let limits = self.quota.check_rpm(&req.uid).await?;
        debug!(
            request_id = %request_id,
            uid = %req.uid,
            remaining = limits.remaining,
            "RPM gate passed"
        );
        self.quota.check_tpd(&req.uid).await?;

        if let Some(provider) = self.registry.get_by_model(&req.model) {
            return Ok(Route { request_id, req, provider });
        }

        let Some(fallback) = self.fallback.select_fallback(&req.model).await else {
            return Err(GatewayError::ModelNotFound { model: req.model });
        };
        let Some(provider) = self.registry.get_by_model(&fallback) else {
            return Err(GatewayError::AllModelsFailed {
                model: req.model,
                fallback,
                message: "fallback model is not registered".to_string(),
            });
        };
        info!(
            request_id = %request_id,
            model = %req.model,
            fallback = %fallback,
            "Requested model not registered, routing to fallback"
        );
        req.model = fallback;
        Ok(Route { request_id, req, provider })
    }

    /// Request model, else store default, else configured default, else the
    /// first active model.
    async fn resolve_model(&self, requested: &str) -> Result<String, GatewayError> {
        if !requested.is_empty() {
            return Ok(requested.to_string());
        }

        let models = match self.store.list_active_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "Failed to list models while resolving default");
                Vec::new()
            },
        };
        if let Some(default) = models.iter().find(|m| m.is_default) {
            return Ok(default.model.clone());
        }
        if let Some(configured) = self.config.default_model.as_deref().filter(|m| !m.is_empty()) {
            return Ok(configured.to_string());
        }
        models
            .into_iter()
            .next()
            .map(|m| m.model)
            .ok_or_else(|| GatewayError::ModelNotFound { model: String::new() })
    }

    /// Run `call` against the routed provider, then once against a fallback
    /// model if the primary failed upstream or its breaker is open.
    async fn with_fallback<T, F, Fut>(
        &self,
        route: Route,
        cancel: &CancellationToken,
        stream: bool,
        call: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(Arc<dyn Provider>, ChatRequest) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let Route { request_id, mut req, provider } = route;

        let err = match self.attempt(&provider, &req, cancel, stream, &call).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_upstream_failure() {
            return Err(err);
        }

        let Some(fallback) = self.fallback.select_fallback(&req.model).await else {
            return Err(err);
        };
        let Some(fallback_provider) = self.registry.get_by_model(&fallback) else {
            return Err(err);
        };

        info!(
            request_id = %request_id,
            model = %req.model,
            provider = %provider.name(),
            fallback = %fallback,
            fallback_provider = %fallback_provider.name(),
            error = %err,
            "Provider failed, using fallback"
        );
        prometheus::record_fallback(provider.name(), fallback_provider.name());

        let original = std::mem::replace(&mut req.model, fallback.clone());
        match self.attempt(&fallback_provider, &req, cancel, stream, &call).await {
            Ok(value) => Ok(value),
            Err(GatewayError::Cancelled) => Err(GatewayError::Cancelled),
            Err(fallback_err) => {
                warn!(
                    request_id = %request_id,
                    model = %original,
                    fallback = %fallback,
                    error = %fallback_err,
                    "Fallback failed"
                );
                Err(GatewayError::AllModelsFailed {
                    model: original,
                    fallback,
                    message: fallback_err.to_string(),
                })
            },
        }
    }

    /// Breaker-guarded retries against one provider.
    async fn attempt<T, F, Fut>(
        &self,
        provider: &Arc<dyn Provider>,
        req: &ChatRequest,
        cancel: &CancellationToken,
        stream: bool,
        call: &F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(Arc<dyn Provider>, ChatRequest) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let breaker = self.breakers.get(provider.name());
        let started = Instant::now();

        let result = self
            .retry
            .execute_observed(
                cancel,
                || {
                    let admitted = breaker.allow();
                    let upstream = call(Arc::clone(provider), req.clone());
                    let breaker = Arc::clone(&breaker);
                    async move {
                        admitted?;
                        let value = upstream.await?;
                        breaker.record_success();
                        Ok(value)
                    }
                },
                |err| {
                    if !matches!(err, GatewayError::CircuitOpen { .. }) {
                        breaker.record_failure(err);
                    }
                },
            )
            .await;

        // An opened stream is recorded by its producer once it ends.
        if !stream || result.is_err() {
            prometheus::record_request(
                provider.name(),
                &req.model,
                stream,
                prometheus::status_label(result.is_ok()),
                started.elapsed(),
            );
        }
        result
    }

    async fn account_usage(&self, uid: &str, tokens: i64) {
        if let Err(e) = self.quota.update_tpd(uid, tokens).await {
            warn!(uid = %uid, tokens, error = %e, "Failed to record token usage");
        }
    }
}
