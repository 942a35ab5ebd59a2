use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ollagram_core::config::GenerationOptions;

/// A single role-tagged message in the conversation sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Request to the inference backend.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Opaque option bag, forwarded unmodified.
    pub options: GenerationOptions,
    pub messages: Vec<ChatMessage>,
}

/// Response from the inference backend.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

/// Interface to an inference backend. One request, one response; the
/// pipeline never streams. Kept as a trait so tests can substitute a
/// scripted backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a chat request and wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}
