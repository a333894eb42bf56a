//! Bias-check command handler.
//!
//! Screens a single message and prints the assessment as JSON, without
//! running retrieval or generation.

use crate::commands::embedding_provider;
use asha_core::{config::AppConfig, AppResult};
use asha_pipeline::BiasClassifier;
use clap::Args;

/// Screen a message for gender-biased framing
#[derive(Args, Debug)]
pub struct BiasCheckCommand {
    /// The message to screen
    pub message: String,
}

impl BiasCheckCommand {
    /// Execute the bias-check command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing bias-check command");

        let provider = embedding_provider(config)?;
        let classifier =
            BiasClassifier::new(provider, config.pipeline.bias_semantic_threshold).await?;

        let assessment = classifier.assess(&self.message).await?;

        let json = serde_json::to_string_pretty(&assessment)?;
        println!("{}", json);

        Ok(())
    }
}
