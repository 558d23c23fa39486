//! Embedding provider trait and the offline hashing implementation.
//!
//! This module defines the `EmbeddingProvider` trait that abstracts over
//! different embedding generation backends (OpenAI, fastembed, etc.).
//!
//! # Providers
//!
//! - `HashingEmbeddingProvider`: Deterministic bag-of-words vectors, no network
//! - `OpenAiEmbeddingProvider`: Embeddings HTTP API (see [`crate::openai`])
//! - `FastEmbedProvider`: Local embedding via fastembed (requires `local-fastembed` feature)

use async_trait::async_trait;
use postop_core::Result;

/// Trait for generating text embeddings.
///
/// Implementations wrap specific embedding backends and provide a uniform
/// async interface. The trait requires `Send + Sync` to allow safe sharing
/// across async tasks.
///
/// The pair (`name()`, `model()`) identifies the embedding space. A
/// persisted index records it and refuses to load under a different one.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, in input order.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    /// Backends that support native batching should override this.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The embedding dimension.
    fn dimension(&self) -> usize;

    /// The provider name for diagnostics.
    fn name(&self) -> &str;

    /// The model producing the vectors.
    fn model(&self) -> &str {
        self.name()
    }
}

/// An offline embedding provider based on hashed word counts.
///
/// Each lowercased alphanumeric token is hashed (blake3) into one of
/// `dimension` buckets; the bucket counts are L2-normalised. Texts sharing
/// words therefore have positive cosine similarity, which is enough for
/// tests and for running without API credentials.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    /// Create a new hashing provider with the given dimension (minimum 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = blake3::hash(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.dimension as u64) as usize
    }

    fn hashed_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            embedding[self.bucket(&token)] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hashed_embedding(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hashed_embedding(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }

    fn model(&self) -> &str {
        "blake3-bag-of-words"
    }
}

// ============================================================================
// Tests
// ============================================================================
