//! LLM provider implementations.

pub mod ollama;
pub mod openrouter;

pub use ollama::OllamaClient;
pub use openrouter::OpenRouterClient;
