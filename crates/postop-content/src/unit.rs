//! The page-level text unit that gets indexed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One page of source text.
///
/// Produced by the [`DocumentLoader`](crate::DocumentLoader) and consumed
/// once by index construction. Units are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUnit {
    /// Extracted page text.
    pub text: String,

    /// Path of the document the page came from.
    pub source_path: PathBuf,

    /// 1-based page number within the document.
    pub page_number: u32,
}

impl DocumentUnit {
    /// Create a new document unit.
    pub fn new(text: impl Into<String>, source_path: impl Into<PathBuf>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            source_path: source_path.into(),
            page_number,
        }
    }

    /// Short human-readable reference, e.g. `knee-replacement.pdf p.3`.
    pub fn source_label(&self) -> String {
        let name = self
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.display().to_string());
        format!("{name} p.{}", self.page_number)
    }
}
