//! Builds embedding and generation clients from configuration.

use crate::config::{EmbeddingBackend, EmbeddingConfig, GenerationBackend, GenerationConfig};
use postop_core::{Error, Result};
use postop_llm::{ClaudeProvider, LlmProvider, OpenAiProvider, RetryWrapper};
use postop_vector::{
    EmbeddingProvider, HashingEmbeddingProvider, OpenAiEmbeddingConfig, OpenAiEmbeddingProvider,
};
use std::sync::Arc;
use std::time::Duration;

/// Env var holding the OpenAI key.
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Env var holding the Anthropic key.
pub const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Dimension of hashed vectors when none is configured.
pub const DEFAULT_HASHING_DIMENSION: usize = 512;

/// Local model used when none is configured.
pub const DEFAULT_FASTEMBED_MODEL: &str = "bge-small-en-v1.5";

const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// API keys, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    /// OpenAI key, used for embeddings and OpenAI generation.
    pub openai_api_key: Option<String>,

    /// Anthropic key, used for Claude generation.
    pub anthropic_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "<set>"),
            )
            .finish()
    }
}

impl Credentials {
    /// Read keys from the process environment. Blank values count as unset.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: read(OPENAI_KEY_ENV),
            anthropic_api_key: read(ANTHROPIC_KEY_ENV),
        }
    }

    fn require(key: &Option<String>, env: &str, purpose: &str) -> Result<String> {
        key.clone()
            .ok_or_else(|| Error::config(format!("{env} must be set to use {purpose}")))
    }
}

/// Build the configured embedding provider.
pub fn embedding_provider(
    config: &EmbeddingConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingBackend::Openai => {
            let key = Credentials::require(
                &credentials.openai_api_key,
                OPENAI_KEY_ENV,
                "OpenAI embeddings",
            )?;
            let mut openai = OpenAiEmbeddingConfig::new(key);
            if let Some(model) = &config.model {
                openai = openai.with_model(model);
            }
            if let Some(base) = &config.api_base {
                openai = openai.with_api_base(base);
            }
            if let Some(dimension) = config.dimension {
                openai = openai.with_dimension(dimension);
            }
            Ok(Arc::new(OpenAiEmbeddingProvider::new(openai)?))
        }
        EmbeddingBackend::Hashing => {
            let dimension = config.dimension.unwrap_or(DEFAULT_HASHING_DIMENSION);
            if dimension == 0 {
                return Err(Error::config("embedding.dimension must be at least 1"));
            }
            Ok(Arc::new(HashingEmbeddingProvider::new(dimension)))
        }
        EmbeddingBackend::Fastembed => fastembed_provider(config),
    }
}

#[cfg(feature = "local-fastembed")]
fn fastembed_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_FASTEMBED_MODEL);
    let cache = dirs::cache_dir().map(|d| d.join("postop").join("fastembed"));
    Ok(Arc::new(postop_vector::FastEmbedProvider::new(
        model,
        cache.as_deref(),
    )?))
}

#[cfg(not(feature = "local-fastembed"))]
fn fastembed_provider(_config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(Error::config(format!(
        "embedding.provider = \"fastembed\" requires building with the `local-fastembed` \
         feature (default model {DEFAULT_FASTEMBED_MODEL})"
    )))
}

/// Build the configured generation provider, wrapped in retries.
pub fn llm_provider(
    config: &GenerationConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn LlmProvider>> {
    let inner: Arc<dyn LlmProvider> = match config.provider {
        GenerationBackend::Openai => {
            let key = Credentials::require(
                &credentials.openai_api_key,
                OPENAI_KEY_ENV,
                "OpenAI generation",
            )?;
            let mut provider =
                OpenAiProvider::new(key, &config.model).with_timeout(GENERATION_TIMEOUT)?;
            if let Some(base) = &config.api_base {
                provider = provider.with_api_base(base);
            }
            Arc::new(provider)
        }
        GenerationBackend::Claude => {
            let key = Credentials::require(
                &credentials.anthropic_api_key,
                ANTHROPIC_KEY_ENV,
                "Claude generation",
            )?;
            let mut provider = ClaudeProvider::new(key, &config.model);
            if let Some(base) = &config.api_base {
                provider = provider.with_api_base(base);
            }
            Arc::new(provider)
        }
    };

    Ok(Arc::new(
        RetryWrapper::new(inner).with_max_attempts(config.max_attempts.max(1)),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn openai_only() -> Credentials {
        Credentials {
            openai_api_key: Some("sk-test".into()),
            anthropic_api_key: None,
        }
    }

    #[test]
    fn test_openai_embedding_needs_key() {
        let err = embedding_provider(&EmbeddingConfig::default(), &Credentials::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains(OPENAI_KEY_ENV));
    }

    #[test]
    fn test_openai_embedding_defaults() {
        let provider = embedding_provider(&EmbeddingConfig::default(), &openai_only()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "text-embedding-3-small");
        assert_eq!(provider.dimension(), 1536);
    }

    #[test]
    fn test_hashing_embedding_needs_no_key() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Hashing,
            ..Default::default()
        };
        let provider = embedding_provider(&config, &Credentials::default()).unwrap();
        assert_eq!(provider.name(), "hashing");
        assert_eq!(provider.dimension(), DEFAULT_HASHING_DIMENSION);

        let config = EmbeddingConfig {
            dimension: Some(64),
            ..config
        };
        assert_eq!(
            embedding_provider(&config, &Credentials::default())
                .unwrap()
                .dimension(),
            64
        );
    }

    #[test]
    fn test_hashing_zero_dimension_rejected() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Hashing,
            dimension: Some(0),
            ..Default::default()
        };
        assert!(embedding_provider(&config, &Credentials::default()).is_err());
    }

    #[cfg(not(feature = "local-fastembed"))]
    #[test]
    fn test_fastembed_without_feature() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Fastembed,
            ..Default::default()
        };
        let err = embedding_provider(&config, &Credentials::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("local-fastembed"));
    }

    #[test]
    fn test_openai_llm_is_wrapped() {
        let provider = llm_provider(&GenerationConfig::default(), &openai_only()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4");
    }

    #[test]
    fn test_claude_llm_needs_anthropic_key() {
        let config = GenerationConfig {
            provider: GenerationBackend::Claude,
            model: "claude-sonnet-4-20250514".into(),
            ..Default::default()
        };
        let err = llm_provider(&config, &openai_only()).err().unwrap();
        assert!(err.to_string().contains(ANTHROPIC_KEY_ENV));

        let credentials = Credentials {
            anthropic_api_key: Some("sk-ant-test".into()),
            ..Default::default()
        };
        let provider = llm_provider(&config, &credentials).unwrap();
        assert_eq!(provider.name(), "claude");
        assert_eq!(provider.model(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_credentials_debug_hides_keys() {
        let debug = format!("{:?}", openai_only());
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<set>"));
    }
}
