//! Command handlers for the Asha CLI.

pub mod bias_check;
pub mod chat;
pub mod events;
pub mod index;
pub mod stats;

pub use bias_check::BiasCheckCommand;
pub use chat::ChatCommand;
pub use events::EventsCommand;
pub use index::IndexCommand;
pub use stats::StatsCommand;

use asha_core::config::{AppConfig, ProviderConfig};
use asha_core::{AppError, AppResult};
use asha_knowledge::{create_provider, EmbeddingProvider, SourceType, SqliteIndex, VectorIndex};
use asha_llm::LlmClient;
use asha_pipeline::{
    BiasClassifier, IntentRouter, Orchestrator, PromptAssembler, Retriever, RetrieverOptions,
    SessionStore,
};
use std::sync::Arc;

/// Open the SQLite index for one source under the .asha directory.
pub fn open_index(config: &AppConfig, source_type: SourceType) -> AppResult<Arc<dyn VectorIndex>> {
    let path = config.asha_dir().join(source_type.index_file());
    let index = SqliteIndex::open(&path, source_type)?;
    Ok(Arc::new(index))
}

/// Create the configured embedding provider.
pub fn embedding_provider(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    create_provider(&config.embedding)
}

/// Resolve a custom endpoint for the active LLM provider, if configured.
fn resolve_endpoint(config: &AppConfig) -> AppResult<Option<String>> {
    let endpoint = match config.get_provider_config(&config.provider)? {
        Some(ProviderConfig::Ollama { endpoint, .. }) => Some(endpoint),
        Some(ProviderConfig::OpenRouter { endpoint, .. }) => endpoint,
        None => None,
    };
    Ok(endpoint)
}

/// Create the LLM client for the active provider.
pub fn build_llm(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    config.validate()?;

    let endpoint = resolve_endpoint(config)?;
    let api_key = config.resolve_api_key(&config.provider)?;

    asha_llm::create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
        .map_err(AppError::Config)
}

/// Wire up the full turn pipeline from configuration.
pub async fn build_orchestrator(config: &AppConfig) -> AppResult<Orchestrator> {
    let provider = embedding_provider(config)?;

    let jobs = open_index(config, SourceType::Job)?;
    let sessions = open_index(config, SourceType::Session)?;

    let bias = BiasClassifier::new(
        Arc::clone(&provider),
        config.pipeline.bias_semantic_threshold,
    )
    .await?;

    let router = IntentRouter::new(
        Arc::clone(&provider),
        config.pipeline.intent_semantic_floor,
    )
    .await?;

    let retriever = Retriever::new(
        jobs,
        sessions,
        Arc::clone(&provider),
        RetrieverOptions::from_settings(&config.pipeline),
    );

    let assembler = PromptAssembler::new(config.pipeline.max_prompt_chars)?;
    let store = SessionStore::new(config.pipeline.history_window);
    let llm = build_llm(config)?;

    Ok(Orchestrator::new(
        bias,
        router,
        retriever,
        assembler,
        store,
        llm,
        config.model.clone(),
    ))
}
