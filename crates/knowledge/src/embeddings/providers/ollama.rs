//! Ollama embedding provider.
//!
//! Uses the Ollama `/api/embeddings` endpoint with a local embedding model
//! such as `nomic-embed-text`.

use crate::embeddings::provider::EmbeddingProvider;
use asha_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Ollama embeddings API request format.
#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

/// Ollama embeddings API response format.
#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama-backed embedding provider.
#[derive(Debug)]
pub struct OllamaEmbeddingProvider {
    base_url: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl OllamaEmbeddingProvider {
    /// Create a new provider for the given endpoint and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Embed a single text via the HTTP API.
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to reach Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Embedding(format!(
                "Ollama embeddings API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if parsed.embedding.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                parsed.embedding.len()
            )));
        }

        Ok(parsed.embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        // The embeddings endpoint takes one prompt per call
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }

        tracing::debug!(
            "Generated {} embeddings via Ollama model '{}'",
            embeddings.len(),
            self.model
        );

        Ok(embeddings)
    }
}
