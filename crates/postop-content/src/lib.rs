//! Source document handling for Postop.
//!
//! Turns a directory of PDF guides into page-level [`DocumentUnit`]s ready
//! for embedding.
//!
//! # Key Abstractions
//!
//! - [`DocumentUnit`]: one page of source text
//! - [`PageExtractor`]: capability that splits a document into page texts
//! - [`DocumentLoader`]: discovers documents and runs the extractor
//! - [`content_hash`]: fingerprint of a corpus for freshness checks

pub mod hash;
pub mod loader;
pub mod pdf;
pub mod unit;

pub use hash::content_hash;
pub use loader::{DocumentLoader, LoadFailure, LoadReport, DEFAULT_PATTERN};
pub use pdf::{ExtractedPage, LopdfExtractor, PageExtractor};
pub use unit::DocumentUnit;
