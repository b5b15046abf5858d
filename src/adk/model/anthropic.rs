//! Anthropic Model - Claude Messages API

use super::{CompletionModel, CompletionRequest};
use crate::adk::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

/// Anthropic requires an explicit output limit
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    /// Optionally uses `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ProviderError> {
        let api_key = ProviderError::require_env("ANTHROPIC_API_KEY")?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    fn request_body(model_name: &str, request: &CompletionRequest) -> serde_json::Value {
        // System prompt travels outside the message list
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = match m.role.as_str() {
                    "model" => "assistant",
                    other => other,
                };
                json!({
                    "role": role,
                    "content": [{ "type": "text", "text": m.content }]
                })
            })
            .collect();

        let mut body = json!({
            "model": model_name,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
        });

        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }
}

#[async_trait]
impl CompletionModel for AnthropicModel {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let body = Self::request_body(&self.model_name, request);

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ProviderError::api("anthropic", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        if let Some(stop_reason) = resp_json["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }
        Ok(resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_lifts_system_prompt() {
        let req = CompletionRequest::new("Be terse", "Summarise this");
        let body = AnthropicModel::request_body("claude-3-5-haiku-latest", &req);

        assert_eq!(body["system"], "Be terse");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "Summarise this");
    }

    #[test]
    fn test_request_body_respects_max_tokens() {
        let req = CompletionRequest::new("", "hi").with_max_tokens(Some(64));
        let body = AnthropicModel::request_body("claude", &req);
        assert_eq!(body["max_tokens"], 64);
        assert!(body.get("system").is_none());
    }
}
