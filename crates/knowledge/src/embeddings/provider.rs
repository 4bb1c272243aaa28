//! Embedding provider trait and factory.

use docvec_core::config::{EmbeddingConfig, API_KEY_VAR, KNOWN_PROVIDERS};
use docvec_core::{AppError, AppResult};
use std::sync::Arc;

use super::providers::{GoogleProvider, HashingProvider};

/// Trait for embedding providers.
///
/// Implementations return exactly one vector per input, in input order, each
/// of length [`dimensions`](Self::dimensions).
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "google", "hash")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Embed document chunks for storage.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed a search query.
    ///
    /// Providers that distinguish queries from documents override this.
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed(text).await
    }

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::permanent("No embedding returned"))
    }
}

/// Create an embedding provider based on configuration.
///
/// `api_key` is required by the `google` provider only.
pub fn create_provider(
    config: &EmbeddingConfig,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "google" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(format!(
                    "{} environment variable is not set (required by the google embedding provider)",
                    API_KEY_VAR
                ))
            })?;
            Ok(Arc::new(GoogleProvider::new(config, api_key)?))
        }

        "hash" => Ok(Arc::new(HashingProvider::new(config.dimensions))),

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: {}",
            other,
            KNOWN_PROVIDERS.join(", ")
        ))),
    }
}
