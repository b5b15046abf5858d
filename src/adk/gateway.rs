// SPDX-License-Identifier: MIT

//! Tool gateway - the only place the workflow touches the network
//!
//! Every call is bounded by a timeout and retried a small, fixed number of
//! times. Failures come back as a [`ToolFault`] value, never as an engine
//! error, so a flaky provider degrades a run instead of aborting it.

use crate::adk::error::ProviderError;
use crate::adk::model::{CompletionModel, CompletionRequest};
use crate::adk::search::{SearchHit, SearchProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why an external call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// No answer within the configured timeout
    Timeout,
    /// Transport, status or decoding failure reported by the provider
    Provider,
}

/// Tagged failure of a gateway call
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ToolFault {
    pub kind: FaultKind,
    pub message: String,
    /// Attempts made before giving up
    pub attempts: u32,
}

impl ToolFault {
    fn timeout(after: Duration, attempts: u32) -> Self {
        Self {
            kind: FaultKind::Timeout,
            message: format!("timed out after {}s", after.as_secs_f32()),
            attempts,
        }
    }

    fn provider(err: &ProviderError, attempts: u32) -> Self {
        Self {
            kind: FaultKind::Provider,
            message: err.to_string(),
            attempts,
        }
    }

    /// `[error: <label>] <message>`
    pub fn error_marker(&self, label: &str) -> String {
        format!("[error: {}] {}", label, self.message)
    }

    /// `[search_error: <query>] <message>`
    pub fn search_marker(&self, query: &str) -> String {
        format!("[search_error: {}] {}", query, self.message)
    }
}

/// Timeout and retry budget for gateway calls
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub retries: u32,
    pub temperature: Option<f32>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retries: 1,
            temperature: None,
        }
    }
}

type Extractor = fn(&Value) -> Option<&str>;

fn chat_message_content(v: &Value) -> Option<&str> {
    v.pointer("/choices/0/message/content")?.as_str()
}

fn completion_text(v: &Value) -> Option<&str> {
    v.pointer("/choices/0/text")?.as_str()
}

fn output_content_text(v: &Value) -> Option<&str> {
    v.pointer("/output/0/content/0/text")?.as_str()
}

fn content_block_text(v: &Value) -> Option<&str> {
    v.get("content")?
        .as_array()?
        .iter()
        .find(|b| b["type"] == "text" || b.get("type").is_none())?
        .get("text")?
        .as_str()
}

fn candidate_part_text(v: &Value) -> Option<&str> {
    v.pointer("/candidates/0/content/parts")?
        .as_array()?
        .iter()
        .find(|p| p.get("thought").and_then(Value::as_bool) != Some(true))?
        .get("text")?
        .as_str()
}

/// Response shapes in the order they are tried
const RESPONSE_SHAPES: [(&str, Extractor); 5] = [
    ("choices.message.content", chat_message_content),
    ("choices.text", completion_text),
    ("output.content.text", output_content_text),
    ("content.text", content_block_text),
    ("candidates.content.parts", candidate_part_text),
];

/// Pull generated text out of whatever shape the provider returned
///
/// Falls back to the whole response rendered as a string.
pub fn extract_text(response: &Value) -> String {
    for (shape, extract) in RESPONSE_SHAPES {
        if let Some(text) = extract(response).filter(|t| !t.is_empty()) {
            log::debug!("Extracted completion text via {}", shape);
            return text.to_string();
        }
    }
    log::warn!("Unrecognised completion response shape, using raw response");
    match response {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Uniform, non-failing access to the completion and search providers
pub struct ToolGateway {
    model: Arc<dyn CompletionModel>,
    search: Arc<dyn SearchProvider>,
    config: GatewayConfig,
}

impl ToolGateway {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        search: Arc<dyn SearchProvider>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            model,
            search,
            config,
        }
    }

    /// One completion; returns the extracted text
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: Option<u32>,
    ) -> Result<String, ToolFault> {
        let request = CompletionRequest::new(system_prompt, user_prompt)
            .with_max_tokens(max_output_tokens)
            .with_temperature(self.config.temperature);

        let response = self
            .call_with_retry(self.model.provider(), || self.model.complete(&request))
            .await?;
        let text = extract_text(&response);

        log::info!(
            "Completion from {} (length: {}, preview: '{}')",
            self.model.provider(),
            text.len(),
            preview(&text, 100)
        );
        Ok(text)
    }

    /// One search; at most `max_results` hits
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>, ToolFault> {
        let mut hits = self
            .call_with_retry(self.search.name(), || self.search.search(query, max_results))
            .await?;
        hits.truncate(max_results as usize);
        log::info!("Search '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }

    async fn call_with_retry<T, F, Fut>(&self, target: &str, mut call: F) -> Result<T, ToolFault>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let fault = match tokio::time::timeout(self.config.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => ToolFault::provider(&e, attempt),
                Err(_) => ToolFault::timeout(self.config.timeout, attempt),
            };

            if attempt > self.config.retries {
                log::warn!("{} call failed after {} attempts: {}", target, attempt, fault);
                return Err(fault);
            }
            log::warn!("{} call failed (attempt {}), retrying: {}", target, attempt, fault);
        }
    }
}

/// First `max` bytes of `text`, cut on a char boundary
pub(crate) fn preview(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails `failures` times, then answers with `response`
    struct FlakyModel {
        failures: usize,
        calls: AtomicUsize,
        response: Value,
    }

    #[async_trait]
    impl CompletionModel for FlakyModel {
        fn provider(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<Value, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ProviderError::api("flaky", "503 unavailable"))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    struct SlowModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionModel for SlowModel {
        fn provider(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!("late"))
        }
    }

    struct FixedSearch {
        hits: usize,
    }

    #[async_trait]
    impl SearchProvider for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, query: &str, _max: u32) -> Result<Vec<SearchHit>, ProviderError> {
            Ok((0..self.hits)
                .map(|i| SearchHit::new(format!("{} #{}", query, i)))
                .collect())
        }
    }

    fn gateway(model: Arc<dyn CompletionModel>, retries: u32) -> ToolGateway {
        ToolGateway::new(
            model,
            Arc::new(FixedSearch { hits: 5 }),
            GatewayConfig {
                timeout: Duration::from_secs(5),
                retries,
                temperature: None,
            },
        )
    }

    #[test]
    fn test_extract_chat_message_content() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(extract_text(&resp), "hello");
    }

    #[test]
    fn test_extract_completion_text() {
        let resp = json!({"choices": [{"text": "legacy completion"}]});
        assert_eq!(extract_text(&resp), "legacy completion");
    }

    #[test]
    fn test_extract_output_content() {
        let resp = json!({"output": [{"content": [{"type": "output_text", "text": "nested"}]}]});
        assert_eq!(extract_text(&resp), "nested");
    }

    #[test]
    fn test_extract_anthropic_and_gemini_shapes() {
        let anthropic = json!({"content": [{"type": "thinking", "thinking": "hmm"}, {"type": "text", "text": "claude"}]});
        assert_eq!(extract_text(&anthropic), "claude");

        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "gemini"}]}}]});
        assert_eq!(extract_text(&gemini), "gemini");
    }

    #[test]
    fn test_extract_prefers_chat_message_over_text() {
        let resp = json!({"choices": [{"message": {"content": "chat"}, "text": "plain"}]});
        assert_eq!(extract_text(&resp), "chat");
    }

    #[test]
    fn test_extract_falls_back_to_stringified_response() {
        let resp = json!({"choices": [{"message": {"content": null}}], "id": "x"});
        let text = extract_text(&resp);
        assert!(text.contains("\"id\":\"x\""));

        assert_eq!(extract_text(&json!("bare string")), "bare string");
    }

    #[test]
    fn test_fault_markers() {
        let fault = ToolFault {
            kind: FaultKind::Provider,
            message: "boom".to_string(),
            attempts: 2,
        };
        assert_eq!(fault.error_marker("plan"), "[error: plan] boom");
        assert_eq!(fault.search_marker("eu cpi"), "[search_error: eu cpi] boom");
    }

    #[tokio::test]
    async fn test_complete_retries_once_then_succeeds() {
        let model = Arc::new(FlakyModel {
            failures: 1,
            calls: AtomicUsize::new(0),
            response: json!({"choices": [{"message": {"content": "recovered"}}]}),
        });
        let gw = gateway(model.clone(), 1);

        let text = gw.complete("sys", "user", None).await.unwrap();
        assert_eq!(text, "recovered");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_complete_gives_up_after_retry_budget() {
        let model = Arc::new(FlakyModel {
            failures: 10,
            calls: AtomicUsize::new(0),
            response: json!(null),
        });
        let gw = gateway(model.clone(), 1);

        let fault = gw.complete("sys", "user", None).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::Provider);
        assert_eq!(fault.attempts, 2);
        assert!(fault.message.contains("503"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_times_out() {
        let model = Arc::new(SlowModel {
            calls: AtomicUsize::new(0),
        });
        let gw = gateway(model.clone(), 1);

        let fault = gw.complete("sys", "user", Some(10)).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::Timeout);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_truncates_to_max_results() {
        let model = Arc::new(FlakyModel {
            failures: 0,
            calls: AtomicUsize::new(0),
            response: json!(null),
        });
        let gw = gateway(model, 0);

        let hits = gw.search("rust", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "rust #0");
    }

    #[test]
    fn test_preview_respects_char_boundary() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("héllo", 2), "h");
    }
}
