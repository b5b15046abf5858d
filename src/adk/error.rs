// SPDX-License-Identifier: MIT

//! Typed errors for the model and search adapters
//!
//! These never reach the workflow engine directly: the gateway folds them
//! into a [`ToolFault`](crate::adk::gateway::ToolFault).

use thiserror::Error;

/// Failure of a single call to an external provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// API key not configured
    #[error("API key not configured: {0} must be set")]
    ApiKeyMissing(String),

    /// Non-success status from the provider
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Response was not in a shape we can use
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Provider not supported by this build
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl ProviderError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Read a required API key from the environment
    pub fn require_env(var: &str) -> Result<String, Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Self::ApiKeyMissing(var.to_string()))
    }
}
