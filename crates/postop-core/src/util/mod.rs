//! Utility modules for file operations and path handling.
//!
//! # Modules
//!
//! - [`files`]: Glob-based file discovery
//! - [`paths`]: Path helpers (tilde expansion)

pub mod files;
pub mod paths;
