//! Postop Core: shared errors, traits, and utilities.
//!
//! This crate provides the foundational types used across all Postop crates.
//! It has no internal Postop dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`traits`]: Configuration abstraction
//! - [`util`]: File discovery and path utilities

pub mod error;
pub mod traits;
pub mod util;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use traits::ConfigProvider;
