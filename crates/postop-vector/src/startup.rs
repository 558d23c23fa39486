//! Index startup: load a persisted index or build one from the corpus.
//!
//! ```text
//!            exists?                 ok
//! NoIndex ──────────────► Loading ───────► Ready
//!    │                       │ corrupt + rebuild_on_corrupt
//!    │ absent / forced       ▼
//!    └────────────────► Building ────────► Ready (after persist)
//! ```
//!
//! The bootstrap runs once and hands back an `Arc<VectorIndex>`; nothing
//! that answers questions can be constructed before it returns.

use crate::embedding::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::types::{BuildOptions, IndexStats};
use postop_content::{DocumentLoader, content_hash};
use postop_core::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of the index during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Nothing loaded yet.
    NoIndex,
    /// Reading a persisted index.
    Loading,
    /// Embedding the corpus.
    Building,
    /// Index available for queries.
    Ready,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoIndex => "no-index",
            Self::Loading => "loading",
            Self::Building => "building",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Where a persisted index lives.
pub trait IndexStore: Send + Sync {
    /// Whether a persisted index is present.
    fn exists(&self) -> bool;

    /// Load the persisted index for use with `provider`.
    fn load(&self, provider: Arc<dyn EmbeddingProvider>) -> Result<VectorIndex>;

    /// Persist a freshly built index.
    fn persist(&self, index: &VectorIndex) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Index store backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsIndexStore {
    location: PathBuf,
}

impl FsIndexStore {
    /// Create a store rooted at `location`.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// The index directory.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl IndexStore for FsIndexStore {
    fn exists(&self) -> bool {
        crate::persistence::index_file(&self.location).is_file()
    }

    fn load(&self, provider: Arc<dyn EmbeddingProvider>) -> Result<VectorIndex> {
        VectorIndex::load(&self.location, provider)
    }

    fn persist(&self, index: &VectorIndex) -> Result<()> {
        index.persist(&self.location).map(|_| ())
    }

    fn describe(&self) -> String {
        self.location.display().to_string()
    }
}

/// Knobs for [`IndexBootstrap`].
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Ignore any persisted index and build from the corpus.
    pub force_rebuild: bool,

    /// Rebuild instead of failing when the persisted index is corrupt.
    pub rebuild_on_corrupt: bool,

    /// Embedding batch settings for a build.
    pub build: BuildOptions,
}

/// Which branch the bootstrap took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPath {
    /// A persisted index was loaded.
    Loaded,
    /// No index was present (or a rebuild was forced); one was built.
    Built,
    /// The persisted index was corrupt and was rebuilt.
    Rebuilt,
}

/// Result of a completed bootstrap.
#[derive(Debug)]
pub struct BootstrapOutcome {
    /// The ready, shared index.
    pub index: Arc<VectorIndex>,
    /// Load or build statistics.
    pub stats: IndexStats,
    /// Branch taken.
    pub path: StartupPath,
}

/// One-shot startup driver for the vector index.
pub struct IndexBootstrap {
    store: Arc<dyn IndexStore>,
    loader: DocumentLoader,
    corpus: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    options: BootstrapOptions,
    state: IndexState,
}

impl IndexBootstrap {
    /// Create a bootstrap for `corpus`, storing the index in `store`.
    pub fn new(
        store: Arc<dyn IndexStore>,
        loader: DocumentLoader,
        corpus: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            loader,
            corpus: corpus.into(),
            provider,
            options: BootstrapOptions::default(),
            state: IndexState::NoIndex,
        }
    }

    /// Set the bootstrap options.
    pub fn with_options(mut self, options: BootstrapOptions) -> Self {
        self.options = options;
        self
    }

    /// Current state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    fn transition(&mut self, next: IndexState) {
        log::info!("Vector index: {} -> {next}", self.state);
        self.state = next;
    }

    /// Drive the state machine to `Ready`.
    ///
    /// # Errors
    ///
    /// Returns the load error when the persisted index is corrupt and
    /// `rebuild_on_corrupt` is off, and any error from loading the corpus,
    /// embedding it, or persisting the result.
    pub async fn run(mut self) -> Result<BootstrapOutcome> {
        let start = Instant::now();
        let mut path = StartupPath::Built;

        if self.options.force_rebuild {
            log::info!("Rebuild forced; ignoring any index at {}", self.store.describe());
        } else if self.store.exists() {
            self.transition(IndexState::Loading);
            match self.store.load(Arc::clone(&self.provider)) {
                Ok(index) => {
                    let stats = IndexStats {
                        units_indexed: index.len(),
                        embedding_dimension: index.dimension(),
                        duration_ms: elapsed_ms(start),
                        from_disk: true,
                        ..Default::default()
                    };
                    self.transition(IndexState::Ready);
                    return Ok(BootstrapOutcome {
                        index: Arc::new(index),
                        stats,
                        path: StartupPath::Loaded,
                    });
                }
                Err(e) if e.is_index_corrupt() && self.options.rebuild_on_corrupt => {
                    log::warn!("{e}; rebuilding from {}", self.corpus.display());
                    path = StartupPath::Rebuilt;
                }
                Err(e) => return Err(e),
            }
        } else {
            log::info!("No vector index at {}", self.store.describe());
        }

        self.transition(IndexState::Building);
        let report = self.loader.load(&self.corpus).await?;
        let attempted: Vec<PathBuf> = report
            .files
            .iter()
            .chain(report.failures.iter().map(|f| &f.path))
            .cloned()
            .collect();
        let hash = content_hash(&attempted);
        let files_processed = report.files.len();
        let failures = report.failures;

        let provider = Arc::clone(&self.provider);
        let index = VectorIndex::build(report.units, provider, &self.options.build)
            .await?
            .with_content_hash(hash);
        self.store.persist(&index)?;

        let stats = IndexStats {
            units_indexed: index.len(),
            files_processed,
            files_skipped: failures.len(),
            embedding_dimension: index.dimension(),
            duration_ms: elapsed_ms(start),
            failures,
            from_disk: false,
        };
        log::info!(
            "Indexed {} unit(s) from {} document(s), {} skipped, in {}ms",
            stats.units_indexed,
            stats.files_processed,
            stats.files_skipped,
            stats.duration_ms
        );

        self.transition(IndexState::Ready);
        Ok(BootstrapOutcome {
            index: Arc::new(index),
            stats,
            path,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
