//! Core traits for Postop.
//!
//! [`ConfigProvider`] abstracts where the corpus and the persisted index
//! live, so the startup code can be driven by the CLI config or by a test
//! fixture alike.

use std::path::PathBuf;

use crate::Result;

/// Trait for application configuration.
///
/// # Bounds
///
/// - `Send + Sync`: Configuration must be shareable across threads
/// - `Clone`: Configuration can be duplicated for passing to subsystems
/// - `'static`: Configuration lifetime is not borrowed
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use postop_core::traits::ConfigProvider;
/// use postop_core::Result;
///
/// #[derive(Clone)]
/// struct ClinicConfig {
///     root: PathBuf,
/// }
///
/// impl ConfigProvider for ClinicConfig {
///     fn project_name(&self) -> &str {
///         "clinic"
///     }
///
///     fn corpus_path(&self) -> Result<PathBuf> {
///         Ok(self.root.join("Guides"))
///     }
///
///     fn index_path(&self) -> Result<PathBuf> {
///         Ok(self.root.join("vector_index"))
///     }
/// }
/// ```
pub trait ConfigProvider: Send + Sync + Clone + 'static {
    /// The project name, used for env var prefixes and default paths.
    fn project_name(&self) -> &str;

    /// Directory holding the source PDF documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn corpus_path(&self) -> Result<PathBuf>;

    /// Directory holding the persisted vector index.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn index_path(&self) -> Result<PathBuf>;
}
