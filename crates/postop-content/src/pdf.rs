//! Page extraction capability and the `lopdf`-backed implementation.
//!
//! PDF parsing is delegated to an external library; this module only
//! adapts it to [`PageExtractor`] so the loader can be tested with fakes.

use postop_core::{Error, Result};
use std::path::Path;

/// Text of a single page, as returned by a [`PageExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Page text (may be empty for image-only pages).
    pub text: String,

    /// 1-based page number.
    pub page_number: u32,
}

impl ExtractedPage {
    /// Create a new extracted page.
    pub fn new(text: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            page_number,
        }
    }
}

/// Splits a document into per-page text.
///
/// Implementations are synchronous; the loader runs them on the blocking
/// thread pool.
pub trait PageExtractor: Send + Sync {
    /// Extract the pages of the document at `path`, in page order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] when the document cannot be opened or parsed.
    fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>>;

    /// The extractor name for diagnostics.
    fn name(&self) -> &str;
}

/// PDF page extractor built on `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }
}

impl PageExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>> {
        let document = lopdf::Document::load(path).map_err(|e| Error::load(path, e.to_string()))?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys().copied() {
            let text = document
                .extract_text(&[page_number])
                .map_err(|e| Error::load(path, format!("page {page_number}: {e}")))?;
            pages.push(ExtractedPage::new(text, page_number));
        }

        Ok(pages)
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}
