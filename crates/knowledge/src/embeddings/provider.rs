//! Embedding provider trait and factory.

use asha_core::config::EmbeddingSettings;
use asha_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(settings: &EmbeddingSettings) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "trigram" => {
            let provider = super::providers::trigram::TrigramProvider::new(settings.dimensions);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let endpoint = settings
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            let provider = super::providers::ollama::OllamaEmbeddingProvider::new(
                endpoint,
                settings.model.clone(),
                settings.dimensions,
            );
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Embedding(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            settings.provider
        ))),
    }
}
