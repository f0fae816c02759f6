//! # Switchyard Types
//!
//! Core types, configuration rows, and error definitions for the Switchyard
//! multi-provider chat gateway.
//!
//! - **`error`** - Caller-facing error taxonomy (input, quota, upstream, breaker)
//! - **`models`** - Provider/model/quota rows and the gateway configuration tree
//! - **`protocol`** - OpenAI-style chat request, response, and stream chunk types
//!
//! ## Architecture Role
//!
//! ```text
//!        switchyard-types (this crate)
//!                 │
//!                 ▼
//!         switchyard-core
//! ```
//!
//! Nothing here performs IO. All types are serializable via serde and cheap to
//! clone across async boundaries.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::{GatewayError, Result};

pub use models::{
    Credential, GatewayConfig, ModelConfig, NewUserQuota, ProviderConfig, QuotaTier, UserQuota,
};
pub use protocol::{
    ChatRequest, ChatResponse, Choice, Message, ModelInfo, Role, StreamChunk, Usage,
};
