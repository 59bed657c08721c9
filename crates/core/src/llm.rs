use crate::error::CorrectionError;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Single-turn, non-streaming chat against Ollama's `POST /api/chat`.
pub struct OllamaChat {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OllamaChat {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CorrectionError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: Url::parse(base_url)?.join("api/chat")?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn complete(&self, prompt: &str) -> Result<String, CorrectionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({
                "model": self.model,
                "stream": false,
                "messages": [
                    { "role": "user", "content": prompt }
                ],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CorrectionError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: Value = response.json().await?;
        parse_chat_response(&parsed)
    }
}

fn parse_chat_response(json: &Value) -> Result<String, CorrectionError> {
    json.pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CorrectionError::BackendResponse {
            backend: "ollama".to_string(),
            details: "missing message content".to_string(),
        })
}
