//! Corpus fingerprinting.
//!
//! A blake3 digest over the sorted document paths and their bytes. When the
//! digest stored with a persisted index matches a freshly computed one, the
//! index still reflects the corpus.

use std::path::PathBuf;

/// Compute the content hash of a set of documents.
///
/// Paths are sorted first so the hash does not depend on discovery order.
/// A file that cannot be read is left out, so it changes the hash once it
/// becomes readable.
pub fn content_hash(paths: &[PathBuf]) -> String {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut hasher = blake3::Hasher::new();
    for path in sorted {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Not fingerprinting {}: {e}", path.display());
                continue;
            }
        };
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }

    hasher.finalize().to_hex().to_string()
}
