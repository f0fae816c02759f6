//! Wire-level chat types.
//!
//! The gateway speaks an OpenAI-style ChatCompletions shape to callers and
//! expects every provider adapter to translate to and from it.

mod chat;

pub use chat::{ChatRequest, ChatResponse, Choice, Message, ModelInfo, Role, StreamChunk, Usage};
