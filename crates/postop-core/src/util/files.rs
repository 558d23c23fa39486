//! File discovery utilities.
//!
//! Wraps the `glob` crate to enumerate the source documents of a corpus
//! directory.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Find all files in `base_path` whose names match `pattern`.
///
/// `pattern` is a glob relative to `base_path` (e.g. `"*.pdf"` or
/// `"**/*.pdf"`). Directories are skipped. A missing `base_path` yields an
/// empty list. Results are sorted by path: the order the filesystem returns
/// entries in is platform-dependent, and index builds should be
/// reproducible.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid pattern and an I/O error when an
/// entry cannot be read.
///
/// # Example
///
/// ```no_run
/// # use postop_core::util::files::find_files;
/// # use std::path::Path;
/// let pdfs = find_files(Path::new("Guides"), "*.pdf")?;
/// # Ok::<(), postop_core::Error>(())
/// ```
pub fn find_files(base_path: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !base_path.is_dir() {
        log::warn!(
            "Directory {} does not exist; no files found",
            base_path.display()
        );
        return Ok(Vec::new());
    }

    let base = glob::Pattern::escape(&base_path.to_string_lossy());
    let full = format!("{base}/{pattern}");
    let entries =
        glob::glob(&full).map_err(|e| Error::config(format!("Invalid glob '{pattern}': {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::io_with_path(e.into_error(), path)
        })?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Check if a path exists.
pub fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}
