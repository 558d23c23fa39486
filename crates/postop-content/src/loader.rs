//! Corpus loading: discover PDFs and split them into page units.
//!
//! # Failure policy
//!
//! By default a document that cannot be parsed is skipped: a warning is
//! logged, the failure is recorded in the [`LoadReport`], and loading
//! continues with the rest of the corpus. With
//! [`DocumentLoader::with_fail_fast`] the first failure aborts the load.

use crate::pdf::{LopdfExtractor, PageExtractor};
use crate::unit::DocumentUnit;
use postop_core::util::files::find_files;
use postop_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default glob for corpus documents, relative to the corpus directory.
pub const DEFAULT_PATTERN: &str = "*.pdf";

/// A document that was skipped during loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Path to the problematic file.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

/// Outcome of loading a corpus directory.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Page units in document order, then page order.
    pub units: Vec<DocumentUnit>,

    /// Documents that were loaded successfully.
    pub files: Vec<PathBuf>,

    /// Documents that were skipped.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Number of documents discovered (loaded + skipped).
    pub fn files_discovered(&self) -> usize {
        self.files.len() + self.failures.len()
    }
}

/// Loads page-level units from a directory of documents.
#[derive(Clone)]
pub struct DocumentLoader {
    extractor: Arc<dyn PageExtractor>,
    pattern: String,
    fail_fast: bool,
}

impl DocumentLoader {
    /// Create a loader around any page extractor.
    pub fn new(extractor: Arc<dyn PageExtractor>) -> Self {
        Self {
            extractor,
            pattern: DEFAULT_PATTERN.to_string(),
            fail_fast: false,
        }
    }

    /// Create a loader for PDF documents.
    pub fn pdf() -> Self {
        Self::new(Arc::new(LopdfExtractor::new()))
    }

    /// Set the document glob pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Abort on the first unreadable document instead of skipping it.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// The document glob pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// List the documents that [`load`](Self::load) would read.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        find_files(dir, &self.pattern)
    }

    /// Load every matching document in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails, or, in fail-fast mode, the
    /// first [`Error::Load`] encountered.
    pub async fn load(&self, dir: &Path) -> Result<LoadReport> {
        let paths = self.discover(dir)?;
        log::info!(
            "Found {} document(s) matching '{}' in {}",
            paths.len(),
            self.pattern,
            dir.display()
        );

        let mut report = LoadReport::default();
        for path in paths {
            log::info!("Loading: {}", path.display());
            match self.load_file(&path).await {
                Ok(units) => {
                    log::debug!("{}: {} page(s)", path.display(), units.len());
                    report.units.extend(units);
                    report.files.push(path);
                }
                Err(e) if self.fail_fast => return Err(e),
                Err(e) => {
                    log::warn!("Skipping {}: {e}", path.display());
                    report.failures.push(LoadFailure {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Loaded {} page(s) from {} of {} document(s)",
            report.units.len(),
            report.files.len(),
            report.files_discovered()
        );
        Ok(report)
    }

    /// Load a single document, one unit per page.
    ///
    /// Pages with no text (blank or image-only) produce no unit; page
    /// numbers of the remaining units are unchanged.
    pub async fn load_file(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();

        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&owned))
            .await
            .map_err(|e| Error::load(path, format!("extraction task failed: {e}")))??;

        Ok(pages
            .into_iter()
            .filter(|page| {
                let blank = page.text.trim().is_empty();
                if blank {
                    log::debug!("{} p.{}: no text, skipped", path.display(), page.page_number);
                }
                !blank
            })
            .map(|page| DocumentUnit::new(page.text, path, page.page_number))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::ExtractedPage;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves canned pages keyed by file name; unknown files fail to parse.
    struct FakeExtractor {
        pages: HashMap<String, Vec<&'static str>>,
    }

    impl FakeExtractor {
        fn new(entries: &[(&str, Vec<&'static str>)]) -> Self {
            Self {
                pages: entries
                    .iter()
                    .map(|(name, pages)| (name.to_string(), pages.clone()))
                    .collect(),
            }
        }
    }

    impl PageExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let pages = self
                .pages
                .get(&name)
                .ok_or_else(|| Error::load(path, "malformed PDF"))?;
            Ok(pages
                .iter()
                .enumerate()
                .map(|(i, text)| ExtractedPage::new(*text, i as u32 + 1))
                .collect())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn corpus(names: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for name in names {
            std::fs::write(temp.path().join(name), b"%PDF-1.4").unwrap();
        }
        temp
    }

    #[tokio::test]
    async fn test_load_one_unit_per_page() {
        let dir = corpus(&["knee.pdf"]);
        let loader = DocumentLoader::new(Arc::new(FakeExtractor::new(&[(
            "knee.pdf",
            vec!["apply ice for swelling", "avoid heavy lifting for six weeks"],
        )])));

        let report = loader.load(dir.path()).await.unwrap();

        assert_eq!(report.units.len(), 2);
        assert_eq!(report.units[0].page_number, 1);
        assert_eq!(report.units[1].page_number, 2);
        assert_eq!(report.units[1].text, "avoid heavy lifting for six weeks");
        assert!(report.units[0].source_path.ends_with("knee.pdf"));
        assert_eq!(report.files.len(), 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_load_ignores_non_matching_files() {
        let dir = corpus(&["hip.pdf", "readme.txt"]);
        let loader = DocumentLoader::new(Arc::new(FakeExtractor::new(&[(
            "hip.pdf",
            vec!["walk daily"],
        )])));

        let report = loader.load(dir.path()).await.unwrap();
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.files_discovered(), 1);
    }

    #[tokio::test]
    async fn test_load_skips_unreadable_documents_by_default() {
        let dir = corpus(&["good.pdf", "bad.pdf"]);
        let loader = DocumentLoader::new(Arc::new(FakeExtractor::new(&[(
            "good.pdf",
            vec!["keep the wound dry"],
        )])));

        let report = loader.load(dir.path()).await.unwrap();

        assert_eq!(report.units.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("bad.pdf"));
        assert!(report.failures[0].message.contains("malformed"));
        assert_eq!(report.files_discovered(), 2);
    }

    #[tokio::test]
    async fn test_load_fail_fast_aborts() {
        let dir = corpus(&["bad.pdf", "good.pdf"]);
        let loader = DocumentLoader::new(Arc::new(FakeExtractor::new(&[(
            "good.pdf",
            vec!["keep the wound dry"],
        )])))
        .with_fail_fast(true);

        let err = loader.load(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), "load");
    }

    #[tokio::test]
    async fn test_load_empty_directory() {
        let dir = corpus(&[]);
        let report = DocumentLoader::pdf().load(dir.path()).await.unwrap();
        assert!(report.units.is_empty());
        assert!(report.files.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let report = DocumentLoader::pdf()
            .load(Path::new("/nonexistent/postop/Guides"))
            .await
            .unwrap();
        assert!(report.units.is_empty());
    }

    #[tokio::test]
    async fn test_blank_pages_are_dropped() {
        let dir = corpus(&["scan.pdf"]);
        let loader = DocumentLoader::new(Arc::new(FakeExtractor::new(&[(
            "scan.pdf",
            vec!["", "  \n", "physio exercises"],
        )])));

        let report = loader.load(dir.path()).await.unwrap();
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].text, "physio exercises");
        assert_eq!(report.units[0].page_number, 3);
        assert_eq!(report.files.len(), 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_all_blank_document_loads_with_no_units() {
        let dir = corpus(&["cover.pdf"]);
        let loader = DocumentLoader::new(Arc::new(FakeExtractor::new(&[(
            "cover.pdf",
            vec!["", "\t"],
        )])));

        let report = loader.load(dir.path()).await.unwrap();
        assert!(report.units.is_empty());
        assert_eq!(report.files.len(), 1);
    }

    #[tokio::test]
    async fn test_load_with_real_extractor_skips_garbage() {
        let dir = corpus(&["garbage.pdf"]);
        let report = DocumentLoader::pdf().load(dir.path()).await.unwrap();
        assert!(report.units.is_empty());
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_builder_settings() {
        let loader = DocumentLoader::pdf().with_pattern("**/*.pdf");
        assert_eq!(loader.pattern(), "**/*.pdf");
        assert_eq!(DocumentLoader::pdf().pattern(), DEFAULT_PATTERN);
    }
}
