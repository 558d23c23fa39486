//! The in-memory vector index.
//!
//! A [`VectorIndex`] is built once from a list of [`DocumentUnit`]s and is
//! read-only afterwards, so it can be shared behind an `Arc` without locks.
//! Search is an exact scan scoring every entry by cosine similarity; the
//! corpus is a handful of care guides, so a scan is cheap.

use crate::embedding::EmbeddingProvider;
use crate::types::{BuildOptions, IndexEntry, SearchHit};
use futures::{StreamExt, TryStreamExt, stream};
use postop_content::DocumentUnit;
use postop_core::{Error, Result};
use std::sync::Arc;
use std::time::Instant;

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Check that a provider returned a usable vector.
fn check_vector(vector: &[f32], dimension: usize, provider: &str) -> Result<()> {
    if vector.len() != dimension {
        return Err(Error::embedding(format!(
            "{provider} returned a {}-dimensional vector, expected {dimension}",
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::embedding(format!(
            "{provider} returned a vector with non-finite values"
        )));
    }
    Ok(())
}

/// Searchable collection of embedded document units.
pub struct VectorIndex {
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) dimension: usize,
    pub(crate) provider: Arc<dyn EmbeddingProvider>,
    pub(crate) content_hash: Option<String>,
    pub(crate) built_at: String,
}

impl VectorIndex {
    /// Embed every unit and build the index.
    ///
    /// Units are embedded in batches of `options.batch_size`, with up to
    /// `options.concurrency` batches in flight. Entry order equals input
    /// order. The build is all-or-nothing: the first embedding error aborts
    /// it and no index is returned.
    pub async fn build(
        units: Vec<DocumentUnit>,
        provider: Arc<dyn EmbeddingProvider>,
        options: &BuildOptions,
    ) -> Result<Self> {
        let start = Instant::now();
        let dimension = provider.dimension();
        let batch_size = options.batch_size.max(1);
        let concurrency = options.concurrency.max(1);

        log::info!(
            "Embedding {} unit(s) with {} ({}), batch size {batch_size}, concurrency {concurrency}",
            units.len(),
            provider.name(),
            provider.model()
        );

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(units.chunks(batch_size).enumerate())
            .map(|(batch_no, chunk)| {
                let provider = Arc::clone(&provider);
                async move {
                    let texts: Vec<&str> = chunk.iter().map(|u| u.text.as_str()).collect();
                    log::debug!("Embedding batch {batch_no} ({} text(s))", texts.len());
                    let vectors = provider.embed_batch(&texts).await?;
                    if vectors.len() != texts.len() {
                        return Err(Error::embedding(format!(
                            "{} returned {} vector(s) for a batch of {}",
                            provider.name(),
                            vectors.len(),
                            texts.len()
                        )));
                    }
                    for vector in &vectors {
                        check_vector(vector, dimension, provider.name())?;
                    }
                    Ok::<_, Error>(vectors)
                }
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let entries: Vec<IndexEntry> = units
            .into_iter()
            .zip(batches.into_iter().flatten())
            .enumerate()
            .map(|(id, (unit, embedding))| IndexEntry {
                id,
                unit,
                embedding,
            })
            .collect();

        log::info!(
            "Built vector index: {} entries, dimension {dimension}, {}ms",
            entries.len(),
            start.elapsed().as_millis()
        );

        Ok(Self {
            entries,
            dimension,
            provider,
            content_hash: None,
            built_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Record the corpus fingerprint this index was built from.
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension shared by every entry.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The provider that embedded the entries (and embeds queries).
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Corpus fingerprint, if one was recorded.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    /// Build timestamp (RFC 3339).
    pub fn built_at(&self) -> &str {
        &self.built_at
    }

    /// Return the `k` entries most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; ties keep
    /// insertion order. An empty index or `k == 0` returns an empty list
    /// without calling the embedding provider.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query).await?;
        check_vector(&query_vector, self.dimension, self.provider.name())?;
        Ok(self.search_by_vector(&query_vector, k))
    }

    /// Rank entries against an already-embedded query.
    pub fn search_by_vector(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Stable: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(entry, score)| SearchHit {
                unit: entry.unit.clone(),
                score,
            })
            .collect()
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("content_hash", &self.content_hash)
            .field("built_at", &self.built_at)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps known texts to fixed vectors and counts calls.
    struct TableProvider {
        calls: AtomicUsize,
    }

    impl TableProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn vector(text: &str) -> Vec<f32> {
            match text {
                "north" => vec![0.0, 1.0],
                "east" => vec![1.0, 0.0],
                "north-east" => vec![1.0, 1.0],
                _ => vec![0.0, 0.0],
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::vector(text))
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::embedding_transient("rate limited"))
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Claims dimension 3 but returns 2-dimensional vectors.
    struct LyingProvider;

    #[async_trait]
    impl EmbeddingProvider for LyingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "lying"
        }
    }

    fn units(texts: &[&str]) -> Vec<DocumentUnit> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentUnit::new(*t, "Guides/guide.pdf", i as u32 + 1))
            .collect()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_build_entry_count_and_order() {
        let provider = Arc::new(HashingEmbeddingProvider::new(64));
        let input = units(&["one", "two", "three", "four", "five"]);
        let options = BuildOptions::default().with_batch_size(2).with_concurrency(3);

        let index = VectorIndex::build(input.clone(), provider, &options)
            .await
            .unwrap();

        assert_eq!(index.len(), 5);
        assert_eq!(index.dimension(), 64);
        for (i, (entry, unit)) in index.entries().iter().zip(&input).enumerate() {
            assert_eq!(entry.id, i);
            assert_eq!(&entry.unit, unit);
            assert_eq!(entry.dimension(), 64);
        }
    }

    #[tokio::test]
    async fn test_build_empty_input() {
        let provider = Arc::new(HashingEmbeddingProvider::new(16));
        let index = VectorIndex::build(Vec::new(), provider, &BuildOptions::default())
            .await
            .unwrap();

        assert!(index.is_empty());
        assert_eq!(index.dimension(), 16);
        assert!(index.search("anything", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_aborts_on_embedding_error() {
        let err = VectorIndex::build(
            units(&["a", "b"]),
            Arc::new(FailingProvider),
            &BuildOptions::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "embedding");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_dimension() {
        let err = VectorIndex::build(
            units(&["a"]),
            Arc::new(LyingProvider),
            &BuildOptions::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "embedding");
        assert!(err.to_string().contains("expected 3"));
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let provider = Arc::new(TableProvider::new());
        let index = VectorIndex::build(
            units(&["east", "north"]),
            provider,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        let hits = index.search("north", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unit.text, "north");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].unit.text, "east");
    }

    #[tokio::test]
    async fn test_search_ties_keep_insertion_order() {
        let provider = Arc::new(TableProvider::new());
        let index = VectorIndex::build(
            units(&["north", "east", "north"]),
            provider,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        // Equal similarity to both axes.
        let hits = index.search("north-east", 3).await.unwrap();
        let pages: Vec<u32> = hits.iter().map(|h| h.unit.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_search_k_larger_than_index() {
        let provider = Arc::new(HashingEmbeddingProvider::new(32));
        let index = VectorIndex::build(
            units(&["knee", "hip", "shoulder"]),
            provider,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        let hits = index.search("knee", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_k_zero_and_empty_index_skip_provider() {
        let provider = Arc::new(TableProvider::new());
        let index = VectorIndex::build(
            units(&["north"]),
            Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
            &BuildOptions::default(),
        )
        .await
        .unwrap();
        let calls_after_build = provider.calls.load(Ordering::SeqCst);

        assert!(index.search("north", 0).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_build);

        let empty = VectorIndex::build(
            Vec::new(),
            Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
            &BuildOptions::default(),
        )
        .await
        .unwrap();
        assert!(empty.search("north", 4).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_build);
    }

    #[tokio::test]
    async fn test_with_content_hash_and_debug() {
        let provider = Arc::new(HashingEmbeddingProvider::new(8));
        let index = VectorIndex::build(units(&["a"]), provider, &BuildOptions::default())
            .await
            .unwrap()
            .with_content_hash("abc123");

        assert_eq!(index.content_hash(), Some("abc123"));
        assert!(!index.built_at().is_empty());
        let debug = format!("{index:?}");
        assert!(debug.contains("hashing"));
        assert!(debug.contains("abc123"));
    }

    fn arb_index() -> impl Strategy<Value = (Vec<Vec<f32>>, Vec<f32>, usize)> {
        (1usize..6).prop_flat_map(|dim| {
            (
                prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dim), 0..20),
                prop::collection::vec(-10.0f32..10.0, dim),
                0usize..25,
            )
        })
    }

    fn index_from_vectors(vectors: Vec<Vec<f32>>, dimension: usize) -> VectorIndex {
        let entries = vectors
            .into_iter()
            .enumerate()
            .map(|(id, embedding)| IndexEntry {
                id,
                unit: DocumentUnit::new(format!("page {id}"), "Guides/p.pdf", id as u32 + 1),
                embedding,
            })
            .collect();
        VectorIndex {
            entries,
            dimension,
            provider: Arc::new(HashingEmbeddingProvider::new(dimension)),
            content_hash: None,
            built_at: String::new(),
        }
    }

    proptest! {
        #[test]
        fn prop_search_is_sorted_and_bounded((vectors, query, k) in arb_index()) {
            let n = vectors.len();
            let index = index_from_vectors(vectors, query.len());
            let hits = index.search_by_vector(&query, k);

            prop_assert_eq!(hits.len(), k.min(n));
            prop_assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
            for hit in &hits {
                prop_assert!((-1.0001..=1.0001).contains(&hit.score));
            }
        }

        #[test]
        fn prop_search_is_idempotent((vectors, query, k) in arb_index()) {
            let index = index_from_vectors(vectors, query.len());
            prop_assert_eq!(index.search_by_vector(&query, k), index.search_by_vector(&query, k));
        }

        #[test]
        fn prop_equal_scores_keep_insertion_order((vectors, query, _k) in arb_index()) {
            let n = vectors.len();
            let index = index_from_vectors(vectors, query.len());
            let hits = index.search_by_vector(&query, n);
            for w in hits.windows(2) {
                if w[0].score == w[1].score {
                    prop_assert!(w[0].unit.page_number < w[1].unit.page_number);
                }
            }
        }
    }
}
