// SPDX-License-Identifier: MIT

//! Gemini Model - Google's generateContent API

use super::{CompletionModel, CompletionRequest};
use crate::adk::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
}

impl GeminiModel {
    /// Create a new GeminiModel
    ///
    /// Requires `GOOGLE_API_KEY` environment variable to be set.
    pub fn new(model_name: String) -> Result<Self, ProviderError> {
        let api_key = ProviderError::require_env("GOOGLE_API_KEY")?;
        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
        })
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role.as_str() {
                    "assistant" => "model",
                    other => other,
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({ "contents": contents });

        if !request.system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(generation_config);
        }
        body
    }
}

#[async_trait]
impl CompletionModel for GeminiModel {
    fn provider(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, self.api_key
        );
        let body = Self::request_body(request);

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ProviderError::api("gemini", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;

        if let Some(finish_reason) = resp_json["candidates"][0]["finishReason"].as_str() {
            log::debug!("Gemini finish reason: {}", finish_reason);
            if finish_reason == "SAFETY" {
                return Err(ProviderError::invalid_response(
                    "gemini",
                    "response blocked by safety filters",
                ));
            }
        }
        Ok(resp_json)
    }
}
