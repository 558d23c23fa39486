//! Configuration for the `postop` CLI.
//!
//! Provides the [`PostopConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `POSTOP_CONFIG` environment variable
//! 3. XDG default: `~/.config/postop/config.toml`
//! 4. Built-in defaults
//!
//! `POSTOP_<SECTION>_<KEY>` environment variables override file values.
//! API keys are never read from the config file, only from the environment.

use confyg::{Confygery, env};
use postop_core::traits::ConfigProvider;
use postop_core::util::paths::expand_tilde;
use postop_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "POSTOP_CONFIG";

const ENV_PREFIX: &str = "POSTOP";
const SECTIONS: [&str; 5] = ["corpus", "index", "embedding", "generation", "retrieval"];

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostopConfig {
    /// Project name, used for the config directory.
    pub project_name: String,

    /// Source documents.
    pub corpus: CorpusConfig,

    /// Persisted vector index.
    pub index: IndexConfig,

    /// Embedding backend.
    pub embedding: EmbeddingConfig,

    /// Generation backend.
    pub generation: GenerationConfig,

    /// Retrieval settings.
    pub retrieval: RetrievalConfig,
}

/// Source document configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding the PDF guides.
    pub path: String,

    /// Glob matched inside `path`.
    pub pattern: String,

    /// Abort indexing on the first unreadable document.
    #[serde(deserialize_with = "lenient::value")]
    pub fail_fast: bool,
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory the index is persisted to.
    pub path: String,

    /// Rebuild from the corpus when the persisted index is corrupt.
    #[serde(deserialize_with = "lenient::value")]
    pub rebuild_on_corrupt: bool,

    /// Texts per embedding request.
    #[serde(deserialize_with = "lenient::value")]
    pub batch_size: usize,

    /// Embedding requests in flight during a build.
    #[serde(deserialize_with = "lenient::value")]
    pub concurrency: usize,
}

/// Embedding backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI embeddings API.
    Openai,
    /// Offline hashed bag-of-words vectors.
    Hashing,
    /// Local transformer model (requires the `local-fastembed` feature).
    Fastembed,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which backend to use.
    pub provider: EmbeddingBackend,

    /// Model name; each backend has its own default.
    pub model: Option<String>,

    /// API base URL override (OpenAI-compatible endpoints).
    pub api_base: Option<String>,

    /// Vector dimension (hashing backend, or unknown OpenAI models).
    #[serde(deserialize_with = "lenient::option")]
    pub dimension: Option<usize>,
}

/// Generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    /// OpenAI chat completions.
    Openai,
    /// Anthropic messages API.
    Claude,
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Which backend to use.
    pub provider: GenerationBackend,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    #[serde(deserialize_with = "lenient::value")]
    pub temperature: f32,

    /// Maximum tokens per answer.
    #[serde(deserialize_with = "lenient::value")]
    pub max_tokens: u32,

    /// API base URL override.
    pub api_base: Option<String>,

    /// Attempts per generation call, including the first.
    #[serde(deserialize_with = "lenient::value")]
    pub max_attempts: u32,
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Pages retrieved per question.
    #[serde(deserialize_with = "lenient::value")]
    pub top_k: usize,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for PostopConfig {
    fn default() -> Self {
        Self {
            project_name: "postop".to_string(),
            corpus: CorpusConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: "Guides".to_string(),
            pattern: postop_content::DEFAULT_PATTERN.to_string(),
            fail_fast: false,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: "vector_index".to_string(),
            rebuild_on_corrupt: false,
            batch_size: 64,
            concurrency: 4,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Openai,
            model: None,
            api_base: None,
            dimension: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationBackend::Openai,
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            api_base: None,
            max_attempts: 3,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: postop_rag::DEFAULT_TOP_K,
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl PostopConfig {
    /// Load configuration from file, environment, and defaults.
    ///
    /// Loading priority:
    /// 1. Explicit `config_path` (from `--config` flag)
    /// 2. `POSTOP_CONFIG` env var
    /// 3. XDG default: `~/.config/postop/config.toml`
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        for section in SECTIONS {
            env_opts.add_section(section);
        }
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be at least 1"));
        }
        if self.index.batch_size == 0 {
            return Err(Error::config("index.batch_size must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::config(format!(
                "generation.temperature must be between 0 and 2, got {}",
                self.generation.temperature
            )));
        }
        Ok(())
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("postop").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `POSTOP_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, ENV_PREFIX, &mut vars);
        Ok(vars)
    }
}

// ============================================================================
// ConfigProvider implementation
// ============================================================================

impl ConfigProvider for PostopConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn corpus_path(&self) -> Result<PathBuf> {
        Ok(expand_tilde(&self.corpus.path))
    }

    fn index_path(&self) -> Result<PathBuf> {
        Ok(expand_tilde(&self.index.path))
    }
}

// ============================================================================
// Helper: flatten TOML to env vars
// ============================================================================

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Helper: accept numbers and booleans given as strings
// ============================================================================

/// Environment overrides reach serde as strings; file values arrive typed.
mod lenient {
    use serde::de::{Deserialize, Deserializer, Error};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Typed(T),
        Text(String),
    }

    fn parse<T, E>(raw: Raw<T>) -> Result<T, E>
    where
        T: FromStr,
        T::Err: Display,
        E: Error,
    {
        match raw {
            Raw::Typed(v) => Ok(v),
            Raw::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }

    pub fn value<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        parse(Raw::deserialize(deserializer)?)
    }

    pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match Option::<Raw<T>>::deserialize(deserializer)? {
            Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(raw) => parse(raw).map(Some),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
