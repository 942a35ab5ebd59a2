use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %req.model, messages = req.messages.len(), "sending request to Ollama");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        info!(
            model = %api_resp.model,
            tokens = api_resp.eval_count.unwrap_or(0),
            "Ollama response received"
        );

        Ok(ChatResponse {
            content: api_resp.message.content,
        })
    }
}

/// Instructions travel inside the final user turn, so the messages array
/// is forwarded as-is; no system message is prepended.
fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model,
        "messages": req.messages,
        "stream": false,
        "options": req.options,
    })
}

// Ollama API response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    message: OllamaMessage,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, Role};
    use ollagram_core::config::GenerationOptions;

    #[test]
    fn request_body_has_no_system_turn() {
        let req = ChatRequest {
            model: "llama3.2".to_string(),
            options: GenerationOptions::default(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Alice: hi".to_string(),
            }],
        };
        let body = build_request_body(&req);
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Alice: hi");
    }

    #[test]
    fn options_pass_through_only_set_fields() {
        let req = ChatRequest {
            model: "llama3.2".to_string(),
            options: GenerationOptions {
                num_ctx: Some(8192),
                temperature: Some(0.6),
                ..Default::default()
            },
            messages: Vec::new(),
        };
        let body = build_request_body(&req);
        assert_eq!(
            body["options"],
            serde_json::json!({"num_ctx": 8192, "temperature": 0.6})
        );
    }

    #[test]
    fn response_parses_without_eval_count() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{"model": "llama3.2", "message": {"role": "assistant", "content": "hi"}, "done": true}"#,
        )
        .unwrap();
        assert_eq!(resp.message.content, "hi");
        assert_eq!(resp.eval_count, None);
    }
}
