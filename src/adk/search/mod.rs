// SPDX-License-Identifier: MIT

//! Web search providers
//!
//! Providers return plain snippets; an empty result list is a valid answer.

pub mod brave;
pub mod tavily;

use crate::adk::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One search result snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SearchHit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            url: None,
        }
    }
}

/// Trait for search backends
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run `query`, returning at most `max_results` hits
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Supported search backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    Tavily,
    Brave,
}

/// Construct a provider, reading its API key from the environment
pub fn build(backend: SearchBackend) -> Result<Arc<dyn SearchProvider>, ProviderError> {
    let provider: Arc<dyn SearchProvider> = match backend {
        SearchBackend::Tavily => Arc::new(tavily::TavilySearch::new()?),
        SearchBackend::Brave => Arc::new(brave::BraveSearch::new()?),
    };
    log::info!("Registered search provider: {}", provider.name());
    Ok(provider)
}
