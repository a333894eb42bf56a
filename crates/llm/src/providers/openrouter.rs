//! OpenRouter LLM provider implementation.
//!
//! OpenRouter exposes an OpenAI-compatible chat completions API and routes
//! requests to the configured upstream model.
//! API: https://openrouter.ai/docs/api-reference

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use asha_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Chat message in the OpenAI wire format.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenRouter API request format.
#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

/// OpenRouter API response format.
#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    model: String,
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// OpenRouter LLM client.
pub struct OpenRouterClient {
    /// Base URL for the OpenRouter API
    base_url: String,

    /// API key sent as a bearer token
    api_key: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url("https://openrouter.ai/api/v1", api_key)
    }

    /// Create a new OpenRouter client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert LlmRequest to the chat completions format.
    ///
    /// The system prompt becomes a leading "system" message; the rendered
    /// prompt is the single "user" message.
    fn to_openrouter_request(&self, request: &LlmRequest) -> OpenRouterRequest {
        let mut messages = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        OpenRouterRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenRouterClient {
    fn provider_name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to OpenRouter");

        let body = self.to_openrouter_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to OpenRouter: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "OpenRouter API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: OpenRouterResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse OpenRouter response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("OpenRouter returned no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        tracing::info!("Received completion from OpenRouter");

        Ok(LlmResponse {
            content,
            model: parsed.model,
            usage,
        })
    }
}
