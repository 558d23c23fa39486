//! Error types for Postop operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all Postop crates. The four domain failure kinds of the answer
//! pipeline each get their own variant so callers can report them
//! distinctly:
//!
//! | Variant          | Raised by                                  |
//! |------------------|--------------------------------------------|
//! | `Load`           | PDF discovery and page extraction           |
//! | `Embedding`      | Embedding providers                         |
//! | `IndexCorrupt`   | Loading a persisted vector index            |
//! | `Generation`     | Language model providers                    |

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur in Postop operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source document could not be read or parsed.
    #[error("Failed to load {}: {message}", path.display())]
    Load {
        /// Document path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An embedding call failed.
    #[error("Embedding error: {message}")]
    Embedding {
        /// What went wrong.
        message: String,
        /// Whether a retry may succeed (rate limits, transport failures).
        retryable: bool,
    },

    /// A persisted vector index is unreadable or inconsistent.
    #[error("Vector index at {} is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// Location of the persisted index.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// A generation call failed.
    #[error("Generation error: {message}")]
    Generation {
        /// What went wrong.
        message: String,
        /// Whether a retry may succeed (rate limits, transport failures).
        retryable: bool,
    },

    /// Caller supplied unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an I/O error.
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(err)
    }

    /// Create an I/O error annotated with the path being accessed.
    pub fn io_with_path(err: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source: err,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a document load error.
    pub fn load(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::Load {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }

    /// Create a non-retryable embedding error.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding {
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create an embedding error that is worth retrying.
    pub fn embedding_transient(msg: impl Into<String>) -> Self {
        Self::Embedding {
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create an index corruption error.
    pub fn index_corrupt(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }

    /// Create a non-retryable generation error.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a generation error that is worth retrying.
    pub fn generation_transient(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Stable, short label for the error kind.
    ///
    /// Used by the CLI so each failure kind is reported distinctly.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::IoWithPath { .. } => "io",
            Self::Config(_) => "config",
            Self::Load { .. } => "load",
            Self::Embedding { .. } => "embedding",
            Self::IndexCorrupt { .. } => "index-corrupt",
            Self::Generation { .. } => "generation",
            Self::InvalidInput(_) => "invalid-input",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding { retryable, .. } | Self::Generation { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Whether this is an index corruption error.
    pub fn is_index_corrupt(&self) -> bool {
        matches!(self, Self::IndexCorrupt { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using Postop's Error type.
pub type Result<T> = std::result::Result<T, Error>;
