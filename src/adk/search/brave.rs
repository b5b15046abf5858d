// SPDX-License-Identifier: MIT

use super::{SearchHit, SearchProvider};
use crate::adk::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Brave caps `count` at 20
const MAX_COUNT: u32 = 20;

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: String,
}

pub struct BraveSearch {
    client: Client,
    api_key: String,
}

impl BraveSearch {
    pub fn new() -> Result<Self, ProviderError> {
        let api_key = ProviderError::require_env("BRAVE_API_KEY")?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }

    fn parse_hits(body: &Value, max_results: u32) -> Result<Vec<SearchHit>, ProviderError> {
        let results_json = body
            .get("web")
            .and_then(|w| w.get("results"))
            .ok_or_else(|| ProviderError::invalid_response("brave", "missing web.results"))?;

        let results: Vec<BraveResult> = serde_json::from_value(results_json.clone())?;

        Ok(results
            .into_iter()
            .take(max_results as usize)
            .map(|r| SearchHit {
                content: if r.title.is_empty() {
                    r.description
                } else {
                    format!("{}: {}", r.title, r.description)
                },
                url: r.url,
            })
            .collect())
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>, ProviderError> {
        let count = max_results.clamp(1, MAX_COUNT);

        let mut url = reqwest::Url::parse("https://api.search.brave.com/res/v1/web/search")
            .map_err(|e| ProviderError::api("brave", e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &count.to_string());

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(ProviderError::api("brave", text));
        }

        let body: Value = resp.json().await?;
        Self::parse_hits(&body, max_results)
    }
}
