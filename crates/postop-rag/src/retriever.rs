//! Top-K retrieval over the vector index.

use postop_content::DocumentUnit;
use postop_core::Result;
use postop_vector::{SearchHit, VectorIndex};
use std::sync::Arc;

/// Number of pages retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

/// Pages retrieved for one question, most similar first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    /// Hits in descending similarity order.
    pub hits: Vec<SearchHit>,
}

impl RetrievalResult {
    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The retrieved units, in order.
    pub fn units(&self) -> impl Iterator<Item = &DocumentUnit> {
        self.hits.iter().map(|hit| &hit.unit)
    }
}

/// Fetches the `top_k` most relevant pages for a question.
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    top_k: usize,
}

impl Retriever {
    /// Create a retriever over a ready index.
    pub fn new(index: Arc<VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    /// Configured number of hits.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The index being searched.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Retrieve up to `top_k` pages for `query`.
    ///
    /// An empty index yields an empty result, not an error.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let hits = self.index.search(query, self.top_k).await?;
        log::debug!(
            "Retrieved {} of {} page(s) for query ({} chars)",
            hits.len(),
            self.index.len(),
            query.len()
        );
        Ok(RetrievalResult { hits })
    }
}
