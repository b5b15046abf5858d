// SPDX-License-Identifier: MIT

//! Model module - completion client trait and provider implementations
//!
//! Clients return the provider's raw JSON response. Turning that into text is
//! the gateway's job, because response shapes drift between provider versions.
//! - [anthropic] - Anthropic's Messages API
//! - [gemini] - Google's Gemini API
//! - [openai] - OpenAI-compatible chat completions (OpenAI, Groq)

pub mod anthropic;
pub mod gemini;
pub mod openai;

use crate::adk::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Everything a provider needs for one completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// System prompt plus a single user turn
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(user)],
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Core trait for completion endpoints
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Short provider label used in logs and error markers
    fn provider(&self) -> &str;

    /// Send the request and return the raw response body
    async fn complete(&self, request: &CompletionRequest)
        -> Result<serde_json::Value, ProviderError>;
}

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(alias = "OpenAI")]
    OpenAI,
    Groq,
    Anthropic,
    Gemini,
}

impl Provider {
    /// Infer a provider from a model name
    pub fn infer(model_name: &str) -> Self {
        if model_name.starts_with("gpt") || model_name.starts_with("o1") {
            Provider::OpenAI
        } else if model_name.starts_with("claude") {
            Provider::Anthropic
        } else if model_name.starts_with("gemini") {
            Provider::Gemini
        } else {
            Provider::Groq
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "openai"),
            Provider::Groq => write!(f, "groq"),
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "groq" => Ok(Provider::Groq),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(ProviderError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Construct a client for `provider`, reading its API key from the environment
pub fn build(
    provider: Provider,
    model_name: String,
) -> Result<Arc<dyn CompletionModel>, ProviderError> {
    log::info!("Using provider: {} with model: {}", provider, model_name);
    let model: Arc<dyn CompletionModel> = match provider {
        Provider::OpenAI => Arc::new(openai::OpenAIModel::new(model_name)?),
        Provider::Groq => Arc::new(openai::OpenAIModel::groq(model_name)?),
        Provider::Anthropic => Arc::new(anthropic::AnthropicModel::new(model_name)?),
        Provider::Gemini => Arc::new(gemini::GeminiModel::new(model_name)?),
    };
    Ok(model)
}
