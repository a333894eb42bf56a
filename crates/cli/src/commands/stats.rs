//! Stats command handler.
//!
//! Reports document counts for the per-source indexes.

use crate::commands::open_index;
use asha_core::{config::AppConfig, AppResult};
use asha_knowledge::{SourceType, VectorIndex};
use clap::Args;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    /// Execute the stats command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let jobs = open_index(config, SourceType::Job)?;
        let sessions = open_index(config, SourceType::Session)?;

        let job_count = jobs.count()?;
        let session_count = sessions.count()?;

        if self.json {
            let output = serde_json::json!({
                "jobs": job_count,
                "sessions": session_count,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Job documents:     {}", job_count);
        println!("Session documents: {}", session_count);

        Ok(())
    }
}
