use super::*;
use crate::gateway::circuit_breaker::CircuitState;
use crate::gateway::stream::StreamSender;
use crate::gateway::testing::{arc, ScriptedProvider, Step};
use crate::modules::memory_store::MemoryStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use switchyard_types::models::{ModelConfig, QuotaTier, UserQuota};
use switchyard_types::{Message, StreamChunk, Usage};

struct Fixture {
    store: Arc<MemoryStore>,
    registry: Arc<ProviderRegistry>,
    gateway: ChatGateway,
}

fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 100;
    config.circuit_breaker.max_failures = 3;
    config
}

fn fixture_with(config: GatewayConfig, models: Vec<ModelConfig>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.upsert_tier(QuotaTier {
        tier: "free".to_string(),
        display_name: "Free".to_string(),
        rpm: 1_000,
        tpd: 100_000,
    });
    for model in models {
        store.upsert_model(model);
    }
    let registry = Arc::new(ProviderRegistry::new());
    let gateway =
        ChatGateway::new(config, Arc::clone(&store) as Arc<dyn GatewayStore>, Arc::clone(&registry));
    Fixture { store, registry, gateway }
}

fn fixture() -> Fixture {
    fixture_with(
        config(),
        vec![
            ModelConfig::new("gpt-4o", "openai", 1),
            ModelConfig::new("deepseek-chat", "deepseek", 2),
        ],
    )
}

fn request(model: &str) -> ChatRequest {
    ChatRequest::new(model, "u1", vec![Message::user("hello")])
}

async fn used_tokens_eventually(store: &MemoryStore, uid: &str, expected: i64) -> bool {
    for _ in 0..100 {
        if store.user_quota(uid).map(|q| q.used_tokens_today) == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_empty_messages_rejected_before_upstream() {
    let fx = fixture();
    let openai = arc(ScriptedProvider::new("openai", &["gpt-4o"]));
    fx.registry.register(openai.clone());

    let req = ChatRequest::new("gpt-4o", "u1", Vec::new());
    let err = fx.gateway.chat(req, &CancellationToken::new()).await.expect_err("empty");
    assert_eq!(err, GatewayError::EmptyMessages);
    assert!(err.is_input_error());
    assert_eq!(openai.calls(), 0);
}

#[tokio::test]
async fn test_chat_success_accounts_usage() {
    let fx = fixture();
    fx.registry.register(arc(ScriptedProvider::new("openai", &["gpt-4o"])));

    let resp = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect("chat");
    assert_eq!(resp.content(), Some("ok"));
    assert_eq!(resp.model, "gpt-4o");
    assert_eq!(fx.store.user_quota("u1").map(|q| q.used_tokens_today), Some(5));
    assert_eq!(fx.gateway.breakers().state("openai"), CircuitState::Closed);
}

#[tokio::test]
async fn test_unknown_model_without_fallback() {
    let fx = fixture();
    let err = fx.gateway.chat(request("gpt-9"), &CancellationToken::new()).await.expect_err("unknown");
    assert_eq!(err, GatewayError::ModelNotFound { model: "gpt-9".to_string() });
}

#[tokio::test]
async fn test_unregistered_model_routes_to_fallback() {
    let fx = fixture();
    let deepseek = arc(ScriptedProvider::new("deepseek", &["deepseek-chat"]));
    fx.registry.register(deepseek.clone());

    let resp = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect("fallback");
    assert_eq!(resp.model, "deepseek-chat");
    assert_eq!(deepseek.calls(), 1);
}

#[tokio::test]
async fn test_model_resolution_order() {
    let mut default_row = ModelConfig::new("deepseek-chat", "deepseek", 2);
    default_row.is_default = true;
    let fx = fixture_with(config(), vec![ModelConfig::new("gpt-4o", "openai", 1), default_row]);
    fx.registry.register(arc(ScriptedProvider::new("openai", &["gpt-4o"])));
    fx.registry.register(arc(ScriptedProvider::new("deepseek", &["deepseek-chat"])));
    let resp = fx.gateway.chat(request(""), &CancellationToken::new()).await.expect("store default");
    assert_eq!(resp.model, "deepseek-chat");

    let mut configured = config();
    configured.default_model = Some("deepseek-chat".to_string());
    let fx = fixture_with(configured, vec![ModelConfig::new("gpt-4o", "openai", 1)]);
    fx.registry.register(arc(ScriptedProvider::new("openai", &["gpt-4o"])));
    fx.registry.register(arc(ScriptedProvider::new("deepseek", &["deepseek-chat"])));
    let resp = fx.gateway.chat(request(""), &CancellationToken::new()).await.expect("config default");
    assert_eq!(resp.model, "deepseek-chat");

    let fx = fixture();
    fx.registry.register(arc(ScriptedProvider::new("openai", &["gpt-4o"])));
    let resp = fx.gateway.chat(request(""), &CancellationToken::new()).await.expect("first active");
    assert_eq!(resp.model, "gpt-4o");

    let fx = fixture_with(config(), Vec::new());
    let err = fx.gateway.chat(request(""), &CancellationToken::new()).await.expect_err("no models");
    assert!(matches!(err, GatewayError::ModelNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    let fx = fixture();
    let openai = arc(
        ScriptedProvider::new("openai", &["gpt-4o"])
            .then(Step::upstream("openai", "503 service unavailable"))
            .then(Step::upstream("openai", "429 rate limit")),
    );
    fx.registry.register(openai.clone());

    let resp = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect("third try");
    assert_eq!(resp.content(), Some("ok"));
    assert_eq!(openai.calls(), 3);
    assert_eq!(fx.gateway.breakers().state("openai"), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_error_not_retried_and_surfaced_without_fallback() {
    let fx = fixture();
    let openai = arc(
        ScriptedProvider::new("openai", &["gpt-4o"])
            .always(Step::upstream("openai", "401 invalid api key")),
    );
    fx.registry.register(openai.clone());

    let err = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect_err("401");
    assert!(matches!(err, GatewayError::Upstream { .. }));
    assert_eq!(openai.calls(), 1);
    let snapshot = fx.gateway.circuit_states();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_falls_back_once() {
    let fx = fixture();
    let openai = arc(
        ScriptedProvider::new("openai", &["gpt-4o"]).always(Step::upstream("openai", "502 bad gateway")),
    );
    let deepseek = arc(ScriptedProvider::new("deepseek", &["deepseek-chat"]));
    fx.registry.register(openai.clone());
    fx.registry.register(deepseek.clone());

    let resp = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect("fallback");
    assert_eq!(resp.model, "deepseek-chat");
    assert_eq!(openai.calls(), 3);
    assert_eq!(deepseek.calls(), 1);
    assert_eq!(deepseek.requests()[0].model, "deepseek-chat");
}

#[tokio::test(start_paused = true)]
async fn test_both_models_failing_reports_all_failed() {
    let fx = fixture();
    fx.registry.register(arc(
        ScriptedProvider::new("openai", &["gpt-4o"]).always(Step::upstream("openai", "invalid request")),
    ));
    fx.registry.register(arc(
        ScriptedProvider::new("deepseek", &["deepseek-chat"])
            .always(Step::upstream("deepseek", "invalid request")),
    ));

    let err = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect_err("both");
    match err {
        GatewayError::AllModelsFailed { model, fallback, .. } => {
            assert_eq!(model, "gpt-4o");
            assert_eq!(fallback, "deepseek-chat");
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_skips_upstream() {
    let fx = fixture_with(config(), vec![ModelConfig::new("gpt-4o", "openai", 1)]);
    let openai = arc(
        ScriptedProvider::new("openai", &["gpt-4o"]).always(Step::upstream("openai", "forbidden")),
    );
    fx.registry.register(openai.clone());

    for _ in 0..3 {
        let _ = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await;
    }
    assert_eq!(fx.gateway.breakers().state("openai"), CircuitState::Open);
    assert_eq!(openai.calls(), 3);

    let err = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect_err("open");
    assert_eq!(err, GatewayError::CircuitOpen { provider: "openai".to_string() });
    assert_eq!(openai.calls(), 3);
}

#[tokio::test]
async fn test_quota_exhausted_blocks_before_upstream() {
    let fx = fixture();
    let openai = arc(ScriptedProvider::new("openai", &["gpt-4o"]));
    fx.registry.register(openai.clone());
    fx.store.set_user_quota(UserQuota {
        uid: "u1".to_string(),
        tier: "free".to_string(),
        rpm: 0,
        tpd: 10,
        used_tokens_today: 10,
        last_reset_at: Some(chrono::Utc::now()),
    });

    let err = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect_err("quota");
    assert!(err.is_quota_error());
    assert_eq!(openai.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rpm_gate_blocks_before_upstream() {
    let fx = fixture();
    let openai = arc(ScriptedProvider::new("openai", &["gpt-4o"]));
    fx.registry.register(openai.clone());
    fx.store.set_user_quota(UserQuota {
        uid: "u1".to_string(),
        tier: "free".to_string(),
        rpm: 1,
        tpd: 0,
        used_tokens_today: 0,
        last_reset_at: None,
    });

    fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect("first");
    let err = fx.gateway.chat(request("gpt-4o"), &CancellationToken::new()).await.expect_err("second");
    assert!(matches!(err, GatewayError::RateLimited { limit: 1, remaining: 0, .. }));
    assert_eq!(openai.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_request_issues_no_call() {
    let fx = fixture();
    let openai = arc(ScriptedProvider::new("openai", &["gpt-4o"]));
    fx.registry.register(openai.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fx.gateway.chat(request("gpt-4o"), &cancel).await.expect_err("cancelled");
    assert_eq!(err, GatewayError::Cancelled);
    assert_eq!(openai.calls(), 0);
}

#[tokio::test]
async fn test_list_models_reflects_registry() {
    let fx = fixture();
    fx.registry.register(arc(ScriptedProvider::new("openai", &["gpt-4o", "gpt-4o-mini"])));
    let ids: Vec<String> = fx.gateway.list_models().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["gpt-4o", "gpt-4o-mini"]);
}

#[tokio::test]
async fn test_stream_relays_chunks_and_accounts_usage() {
    let fx = fixture();
    fx.registry.register(arc(
        ScriptedProvider::new("openai", &["gpt-4o"])
            .then(Step::Reply("hello there world".to_string(), Usage::new(4, 3))),
    ));

    let stream =
        fx.gateway.chat_stream(request("gpt-4o"), &CancellationToken::new()).await.expect("open");
    let (chunks, err) = stream.collect_all().await;
    assert!(err.is_none());
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[3].usage.as_ref().map(|u| u.total_tokens), Some(7));
    assert!(used_tokens_eventually(&fx.store, "u1", 7).await);
}

#[tokio::test]
async fn test_stream_error_surfaces_after_chunks() {
    let fx = fixture();
    fx.registry.register(arc(ScriptedProvider::new("openai", &["gpt-4o"]).then(Step::BreakStream(
        vec!["partial".to_string()],
        GatewayError::Upstream { provider: "openai".to_string(), message: "connection reset".to_string() },
    ))));

    let stream =
        fx.gateway.chat_stream(request("gpt-4o"), &CancellationToken::new()).await.expect("open");
    let (chunks, err) = stream.collect_all().await;
    assert_eq!(chunks.len(), 1);
    assert!(matches!(err, Some(GatewayError::Upstream { .. })));

    for _ in 0..100 {
        if fx.gateway.circuit_states().first().is_some_and(|s| s.failures == 1) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("mid-stream failure was not recorded against the breaker");
}

#[tokio::test(start_paused = true)]
async fn test_stream_open_failure_falls_back() {
    let fx = fixture();
    fx.registry.register(arc(
        ScriptedProvider::new("openai", &["gpt-4o"]).always(Step::upstream("openai", "503")),
    ));
    fx.registry.register(arc(ScriptedProvider::new("deepseek", &["deepseek-chat"])));

    let stream =
        fx.gateway.chat_stream(request("gpt-4o"), &CancellationToken::new()).await.expect("fallback");
    let (chunks, err) = stream.collect_all().await;
    assert!(err.is_none());
    assert!(chunks.iter().all(|c| c.model == "deepseek-chat"));
}

/// Provider whose stream the test drives by hand.
struct HeldStream {
    models: Vec<ModelInfo>,
    sender: Mutex<Option<StreamSender>>,
}

#[async_trait]
impl Provider for HeldStream {
    fn name(&self) -> &str {
        "held"
    }

    fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        Err(GatewayError::Internal { message: "stream only".to_string() })
    }

    async fn chat_stream(&self, _req: &ChatRequest) -> Result<ChatStream, GatewayError> {
        let (tx, rx) = crate::gateway::stream::channel(4);
        *self.sender.lock() = Some(tx);
        Ok(rx)
    }
}

#[tokio::test]
async fn test_request_cancel_closes_stream_with_error() {
    let fx = fixture_with(config(), vec![ModelConfig::new("held-1", "held", 1)]);
    let held = Arc::new(HeldStream {
        models: vec![ModelInfo::new("held-1", "held")],
        sender: Mutex::new(None),
    });
    fx.registry.register(held.clone());
    let cancel = CancellationToken::new();

    let mut stream = fx.gateway.chat_stream(request("held-1"), &cancel).await.expect("open");
    let upstream = held.sender.lock().clone().expect("stream opened");
    assert!(upstream.send(StreamChunk::delta("s1", "held-1", "first")).await);
    assert!(stream.recv().await.is_ok());

    cancel.cancel();
    assert_eq!(stream.recv().await.unwrap_err(), GatewayError::Cancelled);
    upstream.cancelled().await;
    assert!(upstream.is_cancelled());
}

#[tokio::test]
async fn test_dropping_stream_stops_upstream() {
    let fx = fixture_with(config(), vec![ModelConfig::new("held-1", "held", 1)]);
    let held = Arc::new(HeldStream {
        models: vec![ModelInfo::new("held-1", "held")],
        sender: Mutex::new(None),
    });
    fx.registry.register(held.clone());

    let stream =
        fx.gateway.chat_stream(request("held-1"), &CancellationToken::new()).await.expect("open");
    let upstream = held.sender.lock().clone().expect("stream opened");
    drop(stream);

    upstream.cancelled().await;
    assert!(!upstream.send(StreamChunk::delta("s1", "held-1", "late")).await);
}
