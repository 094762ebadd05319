//! Text-generation backend abstraction.
//!
//! The broker only needs one thing from a backend: given a model and an
//! ordered message sequence, return a single reply string. Backends report
//! non-success HTTP statuses in-band (as `status` plus a fallback reply);
//! only transport failures are errors.

mod pollinations;

pub use pollinations::PollinationsProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::Message;

/// Reply substituted when the backend response carries no content.
pub const FALLBACK_REPLY: &str = "Error: no response";

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for chat backends.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Transport-level failure talking to a backend.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.model, self.message)
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Chat request sent to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Full conversation context, oldest first
    pub messages: Vec<Message>,
}

/// Backend reply, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Extracted reply text, or [`FALLBACK_REPLY`]
    pub reply: String,
    /// HTTP status the backend answered with
    pub status: u16,
    /// Parsed response body; `{}` when it was not JSON
    pub raw: Value,
}

impl ChatResponse {
    /// Build a response from a status and raw body, extracting the reply.
    pub fn from_raw(status: u16, raw: Value) -> Self {
        let reply = extract_reply(&raw).unwrap_or(FALLBACK_REPLY).to_string();
        Self { reply, status, raw }
    }
}

/// `choices[0].message.content`, when it is a non-empty string.
pub fn extract_reply(raw: &Value) -> Option<&str> {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
