//! OpenAI embeddings provider.
//!
//! Calls `POST {api_base}/embeddings` with bearer authentication. Any
//! OpenAI-compatible endpoint works as long as it returns the same response
//! shape.

use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use postop_core::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default embeddings model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    /// API key (from `OPENAI_API_KEY`).
    pub api_key: String,
    /// Embedding model name.
    pub model: String,
    /// API base URL.
    pub api_base: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Vector dimension; `None` resolves it from the model name.
    pub dimension: Option<usize>,
}

impl OpenAiEmbeddingConfig {
    /// Create a config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            dimension: None,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set an explicit dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

/// Dimension of the known OpenAI embedding models.
fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
    model: &'a str,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
}

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbeddingProvider {
    config: OpenAiEmbeddingConfig,
    dimension: usize,
    client: Client,
}

impl OpenAiEmbeddingProvider {
    /// Create a new provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the API key is empty, or the model is
    /// unknown and no dimension was given.
    pub fn new(config: OpenAiEmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::config(
                "OpenAI API key is required. Set the OPENAI_API_KEY environment variable.",
            ));
        }

        let dimension = config
            .dimension
            .or_else(|| known_dimension(&config.model))
            .ok_or_else(|| {
                Error::config(format!(
                    "Unknown embedding model '{}': set embedding.dimension explicitly",
                    config.model
                ))
            })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            dimension,
            client,
        })
    }

    async fn call_api(&self, texts: &[&str]) -> Result<EmbeddingResponse> {
        let request = EmbeddingRequest {
            input: texts,
            model: &self.config.model,
            encoding_format: "float",
        };

        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));
        log::debug!("Requesting {} embedding(s) from {url}", texts.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding_transient(format!("Embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let message = format!("Embeddings API error {status}: {message}");
            return Err(if is_transient(status) {
                Error::embedding_transient(message)
            } else {
                Error::embedding(message)
            });
        }

        response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embeddings response: {e}")))
    }
}

/// Rate limits and server-side failures may succeed on retry.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Order response vectors by their `index` and check the count.
fn into_ordered_vectors(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(Error::embedding(format!(
            "Embeddings API returned {} vector(s) for {expected} input(s)",
            data.len()
        )));
    }
    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding("Embeddings API returned no vector"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(Error::embedding(format!(
                "Cannot embed empty text (input {position} of {})",
                texts.len()
            )));
        }
        let response = self.call_api(texts).await?;
        into_ordered_vectors(response, texts.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("model", &self.config.model)
            .field("api_base", &self.config.api_base)
            .field("dimension", &self.dimension)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
