// SPDX-License-Identifier: MIT

//! Tavily search API

use super::{SearchHit, SearchProvider};
use crate::adk::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: String,
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    /// Requires `TAVILY_API_KEY`; `TAVILY_BASE_URL` overrides the endpoint.
    pub fn new() -> Result<Self, ProviderError> {
        let api_key = ProviderError::require_env("TAVILY_API_KEY")?;
        let base_url =
            env::var("TAVILY_BASE_URL").unwrap_or_else(|_| "https://api.tavily.com".to_string());
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url,
        })
    }

    fn into_hits(response: TavilyResponse, max_results: u32) -> Vec<SearchHit> {
        response
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .take(max_results as usize)
            .map(|r| SearchHit {
                content: r.content,
                url: r.url,
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
        };

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ProviderError::api("tavily", text));
        }

        let parsed: TavilyResponse = resp.json().await?;
        Ok(Self::into_hits(parsed, max_results))
    }
}
