//! Vector search infrastructure for Postop.
//!
//! Embeds page-level document units, keeps them in an immutable in-memory
//! index, persists that index to disk, and decides at startup whether to
//! load it or build it from the corpus.
//!
//! # Features
//!
//! - `local-fastembed`: Enable local embedding generation via fastembed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     postop-vector                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider trait                                    │
//! │  ├── HashingEmbeddingProvider (offline, always available)   │
//! │  ├── OpenAiEmbeddingProvider (embeddings HTTP API)          │
//! │  └── FastEmbedProvider (feature: local-fastembed)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorIndex (build, cosine search, persist, load)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IndexStore trait + FsIndexStore                            │
//! │  IndexBootstrap (NoIndex → Loading | Building → Ready)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use postop_vector::{BuildOptions, HashingEmbeddingProvider, VectorIndex};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(HashingEmbeddingProvider::new(256));
//! let index = VectorIndex::build(units, provider, &BuildOptions::default()).await?;
//!
//! for hit in index.search("how long should I avoid lifting", 4).await? {
//!     println!("{}: {:.3}", hit.unit.source_label(), hit.score);
//! }
//! ```

// Core modules (always available)
pub mod embedding;
pub mod index;
pub mod openai;
pub mod persistence;
pub mod startup;
pub mod types;

// Feature-gated provider modules
#[cfg(feature = "local-fastembed")]
pub mod fastembed;

// Re-exports: core types
pub use types::{BuildOptions, IndexEntry, IndexStats, SearchHit};

// Re-exports: providers
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};

// Re-exports: index and persistence
pub use index::{VectorIndex, cosine_similarity};
pub use persistence::{FORMAT_VERSION, INDEX_FILE, IndexMetadata, is_index_fresh, load_metadata};

// Re-exports: startup
pub use startup::{
    BootstrapOptions, BootstrapOutcome, FsIndexStore, IndexBootstrap, IndexState, IndexStore,
    StartupPath,
};

// Feature-gated re-exports
#[cfg(feature = "local-fastembed")]
pub use fastembed::FastEmbedProvider;
