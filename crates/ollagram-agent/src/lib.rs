pub mod ollama;
pub mod pipeline;
pub mod provider;

pub use ollama::OllamaProvider;
pub use provider::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, ProviderError, Role};
