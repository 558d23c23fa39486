//! Local embedding provider using the `fastembed` crate.
//!
//! `fastembed::TextEmbedding` needs exclusive access to run, so it is kept
//! behind `Arc<Mutex<>>` and every call goes through
//! `tokio::task::spawn_blocking`.
//!
//! Requires the `local-fastembed` feature.

use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use postop_core::{Error, Result};
use std::sync::{Arc, Mutex};

fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        other => Err(Error::config(format!(
            "Unknown local embedding model '{other}'. Supported: bge-small-en-v1.5, all-minilm-l6-v2, bge-base-en-v1.5"
        ))),
    }
}

/// Embedding provider running a transformer model on the local machine.
///
/// | Model               | Dimension |
/// |---------------------|-----------|
/// | `bge-small-en-v1.5` | 384       |
/// | `all-minilm-l6-v2`  | 384       |
/// | `bge-base-en-v1.5`  | 768       |
pub struct FastEmbedProvider {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedProvider {
    /// Load `model_name`, downloading it into `cache_dir` if needed.
    pub fn new(model_name: &str, cache_dir: Option<&std::path::Path>) -> Result<Self> {
        let mut init = fastembed::InitOptions::new(resolve_model(model_name)?);
        if let Some(dir) = cache_dir {
            init = init.with_cache_dir(dir.to_path_buf());
        }

        let mut text_embedding = fastembed::TextEmbedding::try_new(init)
            .map_err(|e| Error::embedding(format!("Failed to initialize {model_name}: {e}")))?;

        let dimension = text_embedding
            .embed(vec!["dimension check"], None)
            .map_err(|e| Error::embedding(format!("Failed to detect embedding dimension: {e}")))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::embedding("Empty embedding while detecting dimension"))?;

        log::info!("Loaded local embedding model {model_name} ({dimension} dims)");

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            dimension,
            model_name: model_name.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| Error::embedding("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::embedding(format!("Embedding model lock poisoned: {e}")))?;
            model
                .embed(texts, None)
                .map_err(|e| Error::embedding(format!("Local embedding failed: {e}")))
        })
        .await
        .map_err(|e| Error::embedding(format!("Embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "fastembed"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
