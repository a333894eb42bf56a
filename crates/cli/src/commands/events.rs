//! Events command handler.
//!
//! Lists upcoming community sessions/events from the sessions index,
//! soonest first.

use crate::commands::open_index;
use asha_core::{config::AppConfig, AppResult};
use asha_knowledge::{upcoming_sessions, SourceType};
use clap::Args;

/// List upcoming community events
#[derive(Args, Debug)]
pub struct EventsCommand {
    /// Maximum number of events to show
    #[arg(short, long, default_value = "5")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl EventsCommand {
    /// Execute the events command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing events command");

        let index = open_index(config, SourceType::Session)?;
        let today = chrono::Utc::now().date_naive();

        let events = upcoming_sessions(index.as_ref(), today, self.limit)?;

        if self.json {
            let json = serde_json::to_string_pretty(&events)?;
            println!("{}", json);
            return Ok(());
        }

        if events.is_empty() {
            println!("No upcoming events found.");
            return Ok(());
        }

        for event in &events {
            println!(
                "{}  {} ({}, {}, speaker: {})",
                event.field("session_date").unwrap_or("?"),
                event.field("session_name").unwrap_or("Unknown event"),
                event.field("session_type").unwrap_or("Not specified"),
                event.field("location").unwrap_or("Online"),
                event.field("speaker").unwrap_or("To be announced"),
            );
        }

        Ok(())
    }
}
