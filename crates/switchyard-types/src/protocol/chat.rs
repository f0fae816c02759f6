//! ChatCompletions request, response, and stream chunk types.

use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Empty means "use the default model"
    #[serde(default)]
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stream: bool,
    /// Caller identity used for quota accounting
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, uid: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            stream: false,
            uid: uid.into(),
            session_id: None,
        }
    }

    /// Same request targeted at another model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self { model: model.into(), ..self.clone() }
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// One completion alternative.
///
/// Full responses carry `message`; stream chunks carry `delta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Complete (non-streaming) chat response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub id: String,
    #[serde(default = "chat_completion_object")]
    pub object: String,
    /// Unix seconds
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
}

fn chat_completion_object() -> String {
    "chat.completion".to_string()
}

impl ChatResponse {
    /// Single-choice assistant reply.
    pub fn assistant(
        id: impl Into<String>,
        model: impl Into<String>,
        content: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            object: chat_completion_object(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: Some(Message::assistant(content)),
                delta: None,
                finish_reason: Some("stop".to_string()),
            }],
            usage,
        }
    }

    /// Text of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.as_ref()).map(|m| m.content.as_str())
    }
}

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    pub id: String,
    #[serde(default = "chat_completion_chunk_object")]
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    /// Present on the final chunk only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

fn chat_completion_chunk_object() -> String {
    "chat.completion.chunk".to_string()
}

impl StreamChunk {
    /// Content delta chunk.
    pub fn delta(id: impl Into<String>, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: chat_completion_chunk_object(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: None,
                delta: Some(Message::assistant(content)),
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// Terminal chunk carrying the usage totals.
    pub fn finish(id: impl Into<String>, model: impl Into<String>, usage: Usage) -> Self {
        Self {
            id: id.into(),
            object: chat_completion_chunk_object(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: None,
                delta: None,
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(usage),
        }
    }
}

/// Model metadata a provider advertises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub max_tokens: u32,
    #[serde(default)]
    pub input_price: f64,
    #[serde(default)]
    pub output_price: f64,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            max_tokens: 4096,
            input_price: 0.0,
            output_price: 0.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("be brief")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }

    #[test]
    fn test_request_defaults() {
        let json = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
        let req: ChatRequest = serde_json::from_str(json).unwrap();
        assert!(req.model.is_empty());
        assert!(!req.stream);
        assert!(req.max_tokens.is_none());
        assert_eq!(req.messages[0].role, Role::User);
    }

    #[test]
    fn test_with_model_keeps_everything_else() {
        let mut req = ChatRequest::new("gpt-4o", "u1", vec![Message::user("hi")]);
        req.max_tokens = Some(64);
        let redirected = req.with_model("claude-3");
        assert_eq!(redirected.model, "claude-3");
        assert_eq!(redirected.uid, "u1");
        assert_eq!(redirected.max_tokens, Some(64));
    }

    #[test]
    fn test_usage_total_saturates() {
        assert_eq!(Usage::new(3, 4).total_tokens, 7);
        assert_eq!(Usage::new(u32::MAX, 1).total_tokens, u32::MAX);
    }

    #[test]
    fn test_finish_chunk_carries_usage() {
        let chunk = StreamChunk::finish("c1", "gpt-4o", Usage::new(1, 2));
        assert_eq!(chunk.usage.map(|u| u.total_tokens), Some(3));
        assert_eq!(chunk.object, "chat.completion.chunk");
        let json = serde_json::to_string(&StreamChunk::delta("c1", "gpt-4o", "x")).unwrap();
        assert!(!json.contains("usage"));
    }

    #[test]
    fn test_response_content() {
        let resp = ChatResponse::assistant("r1", "gpt-4o", "hello", Usage::default());
        assert_eq!(resp.content(), Some("hello"));
    }
}
