//! LLM provider factory.
//!
//! This module provides a factory for creating LLM clients based on
//! application configuration. It handles provider resolution and secret
//! injection.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenRouterClient};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openrouter")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (for providers that require it)
///
/// # Returns
/// A shared trait object implementing `LlmClient`
///
/// # Errors
/// Returns error if the provider is unknown or required secrets are missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            let client = OllamaClient::with_base_url(base_url);
            Ok(Arc::new(client))
        }
        "openrouter" => {
            let api_key = api_key.ok_or_else(|| {
                "OpenRouter provider requires API key".to_string()
            })?;
            let client = match endpoint {
                Some(url) => OpenRouterClient::with_base_url(url, api_key),
                None => OpenRouterClient::new(api_key),
            };
            Ok(Arc::new(client))
        }
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_openrouter_requires_api_key() {
        match create_client("openrouter", None, None) {
            Err(err) => assert!(err.contains("OpenRouter provider requires API key")),
            Ok(_) => panic!("Expected error for OpenRouter without API key"),
        }
    }

    #[test]
    fn test_create_openrouter_with_key() {
        let client = create_client("openrouter", None, Some("test-key"));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().provider_name(), "openrouter");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
