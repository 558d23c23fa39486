//! Claude API provider implementation.

use async_trait::async_trait;

use super::openai::status_error;
use super::provider::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};
use postop_core::{Error, Result};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";

/// LLM provider using Anthropic's Claude API.
pub struct ClaudeProvider {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl ClaudeProvider {
    /// Creates a new Claude provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `model` - Model ID (e.g., "claude-sonnet-4-20250514")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the provider at a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });

        if let Some(system) = &request.system_prompt {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if !request.stop_sequences.is_empty() {
            body["stop_sequences"] = serde_json::json!(request.stop_sequences);
        }

        body
    }
}

fn parse_response(response_body: &serde_json::Value) -> Result<CompletionResponse> {
    let content = response_body["content"][0]["text"]
        .as_str()
        .ok_or_else(|| Error::generation("Missing content in Claude response"))?
        .to_string();

    let usage = response_body["usage"]
        .as_object()
        .ok_or_else(|| Error::generation("Missing usage data in Claude response"))?;

    let input_tokens = usage
        .get("input_tokens")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| Error::generation("Invalid input_tokens"))?;
    let output_tokens = usage
        .get("output_tokens")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| Error::generation("Invalid output_tokens"))?;

    let stop_reason = match response_body["stop_reason"].as_str() {
        Some("end_turn") | None => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some("refusal") => StopReason::ContentFilter,
        Some(other) => {
            return Err(Error::generation(format!("Unknown stop reason: {other}")));
        }
    };

    Ok(CompletionResponse {
        content,
        tokens_used: TokenUsage {
            input: input_tokens,
            output: output_tokens,
        },
        stop_reason,
    })
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.request_body(&request);
        let url = format!("{}/messages", self.api_base.trim_end_matches('/'));
        log::debug!("POST {url} (model {})", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::generation_transient(format!("Failed to call Claude API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error("Claude", status, &error_text));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse Claude response: {e}")))?;

        parse_response(&response_body)
    }

    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
