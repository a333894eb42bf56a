//! Configuration management for the Asha assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.asha/config.yaml)
//!
//! The configuration is workspace-centric; index databases and the config
//! file live under `.asha/` inside the workspace directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// pipeline behavior across commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .asha/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider (e.g., "openrouter", "ollama")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Embedding service settings
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Retrieval and conversation tuning
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenRouter {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

/// Embedding service settings.
///
/// The trigram provider is the local-first default; it needs no network
/// access and produces deterministic vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Embedding provider name ("trigram", "ollama")
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Embedding vector dimension
    pub dimensions: usize,

    /// Optional provider endpoint (Ollama)
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Tuning knobs for retrieval, bias screening, and conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Maximum documents returned per retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a document to count as relevant
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Maximum results sharing the same key field value (employer, date)
    #[serde(default = "default_max_per_key_field")]
    pub max_per_key_field: usize,

    /// Number of recent turns included in the prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Character budget for the rendered prompt
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Similarity required for the semantic bias layer to fire
    #[serde(default = "default_bias_semantic_threshold")]
    pub bias_semantic_threshold: f32,

    /// Similarity floor below which a query is out of scope
    #[serde(default = "default_intent_semantic_floor")]
    pub intent_semantic_floor: f32,
}

fn default_top_k() -> usize {
    5
}

fn default_min_relevance() -> f32 {
    0.20
}

fn default_max_per_key_field() -> usize {
    2
}

fn default_history_window() -> usize {
    6
}

fn default_max_prompt_chars() -> usize {
    6000
}

fn default_bias_semantic_threshold() -> f32 {
    0.60
}

fn default_intent_semantic_floor() -> f32 {
    0.25
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_relevance: default_min_relevance(),
            max_per_key_field: default_max_per_key_field(),
            history_window: default_history_window(),
            max_prompt_chars: default_max_prompt_chars(),
            bias_semantic_threshold: default_bias_semantic_threshold(),
            intent_semantic_floor: default_intent_semantic_floor(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    embedding: Option<EmbeddingSettings>,
    pipeline: Option<PipelineSettings>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            embedding: EmbeddingSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `ASHA_WORKSPACE`: Override workspace path
    /// - `ASHA_CONFIG`: Path to config file
    /// - `ASHA_PROVIDER`: LLM provider
    /// - `ASHA_MODEL`: Model identifier
    /// - `ASHA_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        // Load from environment variables
        if let Ok(workspace) = std::env::var("ASHA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("ASHA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Validate workspace exists
        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        // Load from YAML config file if it exists
        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".asha/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ASHA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ASHA_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("ASHA_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        // Merge workspace settings
        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        // Merge logging settings
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        // Merge LLM settings
        if let Some(llm) = config_file.llm {
            // Set active provider from YAML
            result.provider = llm.active_provider.clone();

            // Set model from active provider config
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::OpenRouter { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        // Merge embedding and pipeline settings
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .asha directory.
    pub fn asha_dir(&self) -> PathBuf {
        self.workspace.join(".asha")
    }

    /// Ensure the .asha directory exists.
    pub fn ensure_asha_dir(&self) -> AppResult<()> {
        let asha_dir = self.asha_dir();
        if !asha_dir.exists() {
            std::fs::create_dir_all(&asha_dir)
                .map_err(|e| AppError::Config(format!("Failed to create .asha directory: {}", e)))?;
        }
        Ok(())
    }

    /// Get the active provider configuration.
    pub fn get_provider_config(&self, provider: &str) -> AppResult<Option<ProviderConfig>> {
        if let Some(ref llm) = self.llm {
            Ok(llm.providers.get(provider).cloned())
        } else {
            Ok(None)
        }
    }

    /// Resolve API key from environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> AppResult<Option<String>> {
        // Check explicit ASHA_API_KEY first
        if let Some(ref key) = self.api_key {
            return Ok(Some(key.clone()));
        }

        // Try provider-specific config
        if let Some(provider_config) = self.get_provider_config(provider)? {
            if let ProviderConfig::OpenRouter { api_key_env, .. } = provider_config {
                if let Ok(key) = std::env::var(&api_key_env) {
                    return Ok(Some(key));
                }
            }
        }

        Ok(None)
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["openrouter", "ollama"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        // Validate provider-specific requirements
        if let Some(provider_config) = self.get_provider_config(provider)? {
            match provider_config {
                ProviderConfig::OpenRouter { api_key_env, .. } => {
                    if self.api_key.is_none() && std::env::var(&api_key_env).is_err() {
                        return Err(AppError::Config(format!(
                            "API key not found in environment variable: {}",
                            api_key_env
                        )));
                    }
                }
                ProviderConfig::Ollama { .. } => {
                    // Ollama doesn't require API keys
                }
            }
        }

        Ok(())
    }
}
