//! Index command handler.
//!
//! Ingestion glue: reads job and session record files (JSON arrays) and
//! builds the per-source vector indexes.

use crate::commands::{embedding_provider, open_index};
use asha_core::{config::AppConfig, AppError, AppResult};
use asha_knowledge::{index_jobs, index_sessions, JobRecord, SessionRecord, SourceType, VectorIndex};
use clap::Args;
use std::path::{Path, PathBuf};

/// Build the job and event indexes from record files
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// JSON file with an array of job listing records
    #[arg(long)]
    pub jobs: Option<PathBuf>,

    /// JSON file with an array of session/event records
    #[arg(long)]
    pub sessions: Option<PathBuf>,

    /// Clear each targeted index before loading
    #[arg(long)]
    pub reset: bool,
}

impl IndexCommand {
    /// Execute the index command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        if self.jobs.is_none() && self.sessions.is_none() {
            return Err(AppError::Config(
                "Nothing to index. Pass --jobs and/or --sessions with a record file.".to_string(),
            ));
        }

        let provider = embedding_provider(config)?;

        if let Some(ref path) = self.jobs {
            let records: Vec<JobRecord> = read_records(path)?;
            tracing::info!("Loaded {} job records from {:?}", records.len(), path);

            let index = open_index(config, SourceType::Job)?;
            if self.reset {
                index.reset()?;
            }

            let stats = index_jobs(index.as_ref(), provider.as_ref(), &records).await?;
            println!("Indexed {} job documents", stats.documents);
        }

        if let Some(ref path) = self.sessions {
            let records: Vec<SessionRecord> = read_records(path)?;
            tracing::info!("Loaded {} session records from {:?}", records.len(), path);

            let index = open_index(config, SourceType::Session)?;
            if self.reset {
                index.reset()?;
            }

            let stats = index_sessions(index.as_ref(), provider.as_ref(), &records).await?;
            println!("Indexed {} event documents", stats.documents);
        }

        Ok(())
    }
}

/// Read a JSON array of records from a file.
fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read record file {:?}: {}", path, e)))?;

    serde_json::from_str(&contents)
        .map_err(|e| AppError::Config(format!("Failed to parse record file {:?}: {}", path, e)))
}
