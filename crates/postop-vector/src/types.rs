//! Common types for the vector index.

use postop_content::{DocumentUnit, LoadFailure};
use serde::{Deserialize, Serialize};

// ============================================================================
// Build options
// ============================================================================

/// Controls how an index build calls the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Number of units sent per `embed_batch` call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of batches in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_batch_size() -> usize {
    64
}

fn default_concurrency() -> usize {
    4
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

impl BuildOptions {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of concurrent batches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

// ============================================================================
// Entries and hits
// ============================================================================

/// A document unit paired with its embedding.
///
/// `id` is the entry's insertion position, which is also the tie-break
/// order for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Position of the entry in the index.
    pub id: usize,

    /// The indexed page.
    pub unit: DocumentUnit,

    /// The page embedding.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// The embedding dimension.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matching page.
    pub unit: DocumentUnit,

    /// Cosine similarity to the query (-1.0 to 1.0, higher is more similar).
    pub score: f32,
}

// ============================================================================
// Startup statistics
// ============================================================================

/// Statistics from index startup (load or build).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of units in the ready index.
    pub units_indexed: usize,

    /// Number of documents loaded during a build.
    pub files_processed: usize,

    /// Number of documents skipped due to errors.
    pub files_skipped: usize,

    /// Embedding dimension used.
    pub embedding_dimension: usize,

    /// Duration of the load or build in milliseconds.
    pub duration_ms: u64,

    /// Documents skipped during a build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<LoadFailure>,

    /// Whether the index was loaded from disk.
    #[serde(default)]
    pub from_disk: bool,
}
