//! Asha LLM Library
//!
//! Generation-service abstraction for the Asha assistant. Every call to a
//! language model flows through the single `LlmClient` interface; the
//! provider behind it (OpenRouter, Ollama) is chosen by configuration.

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
