// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat completions (OpenAI itself, Groq)

use super::{CompletionModel, CompletionRequest};
use crate::adk::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat completions client
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    label: &'static str,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ProviderError> {
        let api_key = ProviderError::require_env("OPENAI_API_KEY")?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
            label: "openai",
        })
    }

    /// Create a client for Groq's OpenAI-compatible endpoint
    ///
    /// Requires `GROQ_API_KEY`; `GROQ_BASE_URL` overrides the endpoint.
    pub fn groq(model_name: String) -> Result<Self, ProviderError> {
        let api_key = ProviderError::require_env("GROQ_API_KEY")?;
        let base_url = env::var("GROQ_BASE_URL").unwrap_or_else(|_| GROQ_BASE_URL.to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
            label: "groq",
        })
    }

    /// Build the chat completions request body
    fn request_body(model_name: &str, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        for m in &request.messages {
            let role = match m.role.as_str() {
                "model" => "assistant",
                other => other,
            };
            messages.push(json!({ "role": role, "content": m.content }));
        }

        let mut body = json!({
            "model": model_name,
            "messages": messages
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl CompletionModel for OpenAIModel {
    fn provider(&self) -> &str {
        self.label
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&self.model_name, request);

        log::debug!(
            "{} request body: {}",
            self.label,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(ProviderError::api(self.label, format!("{}: {}", status, text)));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("{} response: {}", self.label, resp_json);
        Ok(resp_json)
    }
}
