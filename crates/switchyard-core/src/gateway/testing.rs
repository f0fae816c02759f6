//! Scripted provider for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use switchyard_types::{ChatRequest, ChatResponse, GatewayError, ModelInfo, StreamChunk, Usage};

use crate::gateway::provider::Provider;
use crate::gateway::stream::{self, ChatStream};

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Reply(String, Usage),
    Fail(GatewayError),
    /// Stream these deltas, then end with the error
    BreakStream(Vec<String>, GatewayError),
    /// Never answer
    Hang,
}

impl Step {
    pub(crate) fn reply(text: &str) -> Self {
        Step::Reply(text.to_string(), Usage::new(3, 2))
    }

    pub(crate) fn upstream(provider: &str, message: &str) -> Self {
        Step::Fail(GatewayError::Upstream {
            provider: provider.to_string(),
            message: message.to_string(),
        })
    }
}

pub(crate) struct ScriptedProvider {
    name: String,
    models: Vec<ModelInfo>,
    script: Mutex<VecDeque<Step>>,
    otherwise: Mutex<Step>,
    calls: AtomicU32,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(name: &str, models: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            models: models.iter().map(|m| ModelInfo::new(*m, name)).collect(),
            script: Mutex::new(VecDeque::new()),
            otherwise: Mutex::new(Step::reply("ok")),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a one-shot step.
    pub(crate) fn then(self, step: Step) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Step used once the queue is empty.
    pub(crate) fn always(self, step: Step) -> Self {
        *self.otherwise.lock() = step;
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    fn next_step(&self, req: &ChatRequest) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        let queued = self.script.lock().pop_front();
        queued.unwrap_or_else(|| self.otherwise.lock().clone())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        match self.next_step(req) {
            Step::Reply(text, usage) => {
                Ok(ChatResponse::assistant(format!("{}-resp", self.name), &req.model, text, usage))
            },
            Step::Fail(err) | Step::BreakStream(_, err) => Err(err),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<ChatStream, GatewayError> {
        let id = format!("{}-stream", self.name);
        let model = req.model.clone();
        let (deltas, ending) = match self.next_step(req) {
            Step::Reply(text, usage) => {
                (text.split_whitespace().map(str::to_string).collect::<Vec<_>>(), Ok(usage))
            },
            Step::BreakStream(deltas, err) => (deltas, Err(err)),
            Step::Fail(err) => return Err(err),
            Step::Hang => std::future::pending().await,
        };

        let (tx, rx) = stream::channel(4);
        tokio::spawn(async move {
            for delta in deltas {
                if !tx.send(StreamChunk::delta(&id, &model, delta)).await {
                    return;
                }
            }
            match ending {
                Ok(usage) => {
                    tx.send(StreamChunk::finish(&id, &model, usage)).await;
                    tx.close();
                },
                Err(err) => tx.close_with_error(err),
            }
        });
        Ok(rx)
    }
}

pub(crate) fn arc(provider: ScriptedProvider) -> Arc<ScriptedProvider> {
    Arc::new(provider)
}
