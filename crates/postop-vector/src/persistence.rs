//! On-disk format and freshness checking for the vector index.
//!
//! An index is stored as a single versioned JSON document,
//! `<location>/index.json`, holding the [`IndexMetadata`] and every entry.
//! Writes go to a uniquely named temporary file in the same directory which
//! is synced and then renamed over the target, so a crash mid-write never
//! leaves a half-written index behind.
//!
//! Loading validates the document against the metadata and against the
//! embedding provider it will serve queries with. Every problem is reported
//! as [`Error::IndexCorrupt`].

use crate::embedding::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::types::IndexEntry;
use postop_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// File name of the persisted index inside its location directory.
pub const INDEX_FILE: &str = "index.json";

/// Metadata stored alongside the index entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// On-disk format version.
    pub format_version: u32,

    /// Embedding dimension.
    pub dimension: usize,

    /// Number of entries.
    pub entry_count: usize,

    /// Embedding provider name.
    pub provider: String,

    /// Model name used for embeddings.
    pub model: String,

    /// Corpus fingerprint at build time.
    #[serde(default)]
    pub content_hash: Option<String>,

    /// Build timestamp (RFC 3339).
    pub built_at: String,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    metadata: IndexMetadata,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct PersistedIndex {
    metadata: IndexMetadata,
    entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct PersistedHeader {
    metadata: IndexMetadata,
}

/// Path of the index file for a location directory.
pub fn index_file(location: &Path) -> PathBuf {
    location.join(INDEX_FILE)
}

impl VectorIndex {
    /// Metadata describing this index.
    pub fn metadata(&self) -> IndexMetadata {
        IndexMetadata {
            format_version: FORMAT_VERSION,
            dimension: self.dimension,
            entry_count: self.entries.len(),
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            content_hash: self.content_hash.clone(),
            built_at: self.built_at.clone(),
        }
    }

    /// Serialize the index to its on-disk JSON form.
    pub fn to_json(&self) -> Result<String> {
        let doc = PersistedIndexRef {
            metadata: self.metadata(),
            entries: &self.entries,
        };
        Ok(serde_json::to_string(&doc)?)
    }

    /// Parse and validate an index document.
    ///
    /// `origin` is only used in error messages.
    pub fn from_json(
        json: &str,
        provider: Arc<dyn EmbeddingProvider>,
        origin: &Path,
    ) -> Result<Self> {
        let doc: PersistedIndex = serde_json::from_str(json)
            .map_err(|e| Error::index_corrupt(origin, format!("unreadable document: {e}")))?;
        validate(&doc, provider.as_ref(), origin)?;

        let PersistedIndex { metadata, entries } = doc;
        Ok(Self {
            entries,
            dimension: metadata.dimension,
            provider,
            content_hash: metadata.content_hash,
            built_at: metadata.built_at,
        })
    }

    /// Write the index to `<location>/index.json`, creating `location` as
    /// needed. Returns the path of the written file.
    pub fn persist(&self, location: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(location).map_err(|e| Error::io_with_path(e, location))?;

        let target = index_file(location);
        let json = self.to_json()?;

        // Uniquely named, so concurrent writers never share a scratch file.
        let mut tmp = tempfile::NamedTempFile::new_in(location)
            .map_err(|e| Error::io_with_path(e, location))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io_with_path(e, tmp.path()))?;

        tmp.persist(&target)
            .map_err(|e| Error::io_with_path(e.error, &target))?;

        log::info!(
            "Persisted vector index ({} entries) to {}",
            self.entries.len(),
            target.display()
        );
        Ok(target)
    }

    /// Load an index previously written with [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexCorrupt`] when the file is unreadable, the
    /// format version is unknown, the entries disagree with the metadata,
    /// or the index was built in a different embedding space than
    /// `provider` produces.
    pub fn load(location: &Path, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let path = index_file(location);
        let json = std::fs::read_to_string(&path)
            .map_err(|e| Error::index_corrupt(&path, format!("cannot read index file: {e}")))?;

        let index = Self::from_json(&json, provider, &path)?;
        log::info!(
            "Loaded vector index ({} entries, dimension {}) from {}",
            index.len(),
            index.dimension(),
            path.display()
        );
        Ok(index)
    }
}

fn validate(doc: &PersistedIndex, provider: &dyn EmbeddingProvider, origin: &Path) -> Result<()> {
    let meta = &doc.metadata;
    let corrupt = |msg: String| -> Result<()> { Err(Error::index_corrupt(origin, msg)) };

    if meta.format_version != FORMAT_VERSION {
        return corrupt(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            meta.format_version
        ));
    }
    if doc.entries.len() != meta.entry_count {
        return corrupt(format!(
            "metadata declares {} entries but {} are present",
            meta.entry_count,
            doc.entries.len()
        ));
    }
    for (position, entry) in doc.entries.iter().enumerate() {
        if entry.id != position {
            return corrupt(format!("entry at position {position} has id {}", entry.id));
        }
        if entry.dimension() != meta.dimension {
            return corrupt(format!(
                "entry {position} has dimension {}, index dimension is {}",
                entry.dimension(),
                meta.dimension
            ));
        }
        if entry.embedding.iter().any(|v| !v.is_finite()) {
            return corrupt(format!("entry {position} has non-finite values"));
        }
    }
    if meta.dimension != provider.dimension()
        || meta.provider != provider.name()
        || meta.model != provider.model()
    {
        return corrupt(format!(
            "built with {}/{} ({} dims) but the configured embedder is {}/{} ({} dims)",
            meta.provider,
            meta.model,
            meta.dimension,
            provider.name(),
            provider.model(),
            provider.dimension()
        ));
    }
    Ok(())
}

/// Read only the metadata of a persisted index.
pub fn load_metadata(location: &Path) -> Result<IndexMetadata> {
    let path = index_file(location);
    let json = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let header: PersistedHeader = serde_json::from_str(&json)?;
    Ok(header.metadata)
}

/// Check if a persisted index was built from the current corpus.
///
/// Returns `true` if the index exists and its stored content hash equals
/// `current_hash`.
pub fn is_index_fresh(location: &Path, current_hash: &str) -> bool {
    match load_metadata(location) {
        Ok(metadata) => metadata.content_hash.as_deref() == Some(current_hash),
        Err(_) => false,
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
    use crate::types::BuildOptions;
    use postop_content::DocumentUnit;
    use tempfile::tempdir;

    async fn sample_index(provider: Arc<dyn EmbeddingProvider>) -> VectorIndex {
        let units = vec![
            DocumentUnit::new("apply ice for swelling", "Guides/knee.pdf", 1),
            DocumentUnit::new("avoid heavy lifting for six weeks", "Guides/knee.pdf", 2),
            DocumentUnit::new("walk daily with support", "Guides/hip.pdf", 1),
        ];
        VectorIndex::build(units, provider, &BuildOptions::default())
            .await
            .unwrap()
            .with_content_hash("abc123")
    }

    fn hashing(dim: usize) -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbeddingProvider::new(dim))
    }

    fn rewrite(location: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = index_file(location);
        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        edit(&mut doc);
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_persist_then_load_preserves_search() {
        let dir = tempdir().unwrap();
        let location = dir.path().join("vector_index");
        let index = sample_index(hashing(128)).await;

        let written = index.persist(&location).unwrap();
        assert_eq!(written, location.join(INDEX_FILE));
        assert_eq!(std::fs::read_dir(&location).unwrap().count(), 1);

        let loaded = VectorIndex::load(&location, hashing(128)).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.content_hash(), Some("abc123"));
        assert_eq!(loaded.built_at(), index.built_at());

        let query = "how long should I avoid lifting";
        let before = index.search(query, 3).await.unwrap();
        let after = loaded.search(query, 3).await.unwrap();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.unit, b.unit);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_persist_overwrites_existing() {
        let dir = tempdir().unwrap();
        let index = sample_index(hashing(16)).await;
        index.persist(dir.path()).unwrap();
        index.persist(dir.path()).unwrap();

        let meta = load_metadata(dir.path()).unwrap();
        assert_eq!(meta.entry_count, 3);
    }

    #[tokio::test]
    async fn test_concurrent_persists_leave_one_valid_index() {
        let dir = tempdir().unwrap();
        let index = sample_index(hashing(16)).await;

        std::thread::scope(|scope| {
            let writers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| index.persist(dir.path())))
                .collect();
            for writer in writers {
                writer.join().unwrap().unwrap();
            }
        });

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(INDEX_FILE)]);

        let loaded = VectorIndex::load(dir.path(), hashing(16)).unwrap();
        assert_eq!(loaded.entries(), index.entries());
    }

    #[tokio::test]
    async fn test_metadata_contents() {
        let index = sample_index(hashing(32)).await;
        let meta = index.metadata();
        assert_eq!(meta.format_version, FORMAT_VERSION);
        assert_eq!(meta.dimension, 32);
        assert_eq!(meta.entry_count, 3);
        assert_eq!(meta.provider, "hashing");
        assert_eq!(meta.model, "blake3-bag-of-words");
        assert_eq!(meta.content_hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_load_missing_is_corrupt() {
        let dir = tempdir().unwrap();
        let err = VectorIndex::load(dir.path(), hashing(8)).unwrap_err();
        assert!(err.is_index_corrupt());
    }

    #[test]
    fn test_load_invalid_json_is_corrupt() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{\"metadata\": {").unwrap();
        let err = VectorIndex::load(dir.path(), hashing(8)).unwrap_err();
        assert!(err.is_index_corrupt());
        assert!(err.to_string().contains("unreadable"));
    }

    #[tokio::test]
    async fn test_load_rejects_provider_dimension_mismatch() {
        let dir = tempdir().unwrap();
        sample_index(hashing(64)).await.persist(dir.path()).unwrap();

        let err = VectorIndex::load(dir.path(), hashing(32)).unwrap_err();
        assert!(err.is_index_corrupt());
        assert!(err.to_string().contains("64 dims"));
    }

    #[tokio::test]
    async fn test_load_rejects_entry_dimension_mismatch() {
        let dir = tempdir().unwrap();
        sample_index(hashing(8)).await.persist(dir.path()).unwrap();
        rewrite(dir.path(), |doc| {
            doc["entries"][1]["embedding"] = serde_json::json!([0.5, 0.5]);
        });

        let err = VectorIndex::load(dir.path(), hashing(8)).unwrap_err();
        assert!(err.is_index_corrupt());
        assert!(err.to_string().contains("entry 1"));
    }

    #[tokio::test]
    async fn test_load_rejects_entry_count_mismatch() {
        let dir = tempdir().unwrap();
        sample_index(hashing(8)).await.persist(dir.path()).unwrap();
        rewrite(dir.path(), |doc| {
            doc["metadata"]["entry_count"] = serde_json::json!(5);
        });

        let err = VectorIndex::load(dir.path(), hashing(8)).unwrap_err();
        assert!(err.is_index_corrupt());
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        sample_index(hashing(8)).await.persist(dir.path()).unwrap();
        rewrite(dir.path(), |doc| {
            doc["metadata"]["format_version"] = serde_json::json!(99);
        });

        let err = VectorIndex::load(dir.path(), hashing(8)).unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }

    #[tokio::test]
    async fn test_load_rejects_shuffled_ids() {
        let dir = tempdir().unwrap();
        sample_index(hashing(8)).await.persist(dir.path()).unwrap();
        rewrite(dir.path(), |doc| {
            doc["entries"][0]["id"] = serde_json::json!(2);
        });

        let err = VectorIndex::load(dir.path(), hashing(8)).unwrap_err();
        assert!(err.is_index_corrupt());
    }

    #[tokio::test]
    async fn test_is_index_fresh() {
        let dir = tempdir().unwrap();
        sample_index(hashing(8)).await.persist(dir.path()).unwrap();

        assert!(is_index_fresh(dir.path(), "abc123"));
        assert!(!is_index_fresh(dir.path(), "different_hash"));
        assert!(!is_index_fresh(&dir.path().join("missing"), "abc123"));
    }

    #[test]
    fn test_metadata_without_content_hash_deserializes() {
        let json = r#"{
            "format_version": 1,
            "dimension": 4,
            "entry_count": 0,
            "provider": "hashing",
            "model": "blake3-bag-of-words",
            "built_at": "2026-01-15T12:00:00Z"
        }"#;
        let meta: IndexMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.content_hash, None);
    }
}
