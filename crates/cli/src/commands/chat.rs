//! Chat command handler.
//!
//! Runs one turn of the conversational pipeline, or an interactive loop
//! reading messages from stdin when no message is given.

use crate::commands::build_orchestrator;
use asha_core::{config::AppConfig, AppResult};
use asha_pipeline::{Orchestrator, TurnOutcome};
use clap::Args;
use std::io::{BufRead, Write};

/// Apology shown when the generation call itself fails.
const TURN_FAILURE_MESSAGE: &str =
    "I'm sorry, I ran into a problem while generating a response. Please try again.";

/// Chat with the assistant
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// The message to send (omit for an interactive stdin session)
    pub message: Option<String>,

    /// Conversation id; turns with the same id share history
    #[arg(short, long, default_value = "local")]
    pub session: String,

    /// Output the full turn outcome as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let orchestrator = build_orchestrator(config).await?;

        match self.message {
            Some(ref message) => self.run_turn(&orchestrator, message).await,
            None => self.run_interactive(&orchestrator).await,
        }
    }

    /// Run a single turn and print the result.
    async fn run_turn(&self, orchestrator: &Orchestrator, message: &str) -> AppResult<()> {
        match orchestrator.handle_turn(&self.session, message).await {
            Ok(outcome) => {
                self.print_outcome(&outcome)?;
                Ok(())
            }
            Err(e) => {
                println!("{}", TURN_FAILURE_MESSAGE);
                Err(e)
            }
        }
    }

    /// Interactive loop: one turn per stdin line, until EOF.
    async fn run_interactive(&self, orchestrator: &Orchestrator) -> AppResult<()> {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            eprint!("you> ");
            std::io::stderr().flush().ok();

            let line = match lines.next() {
                Some(line) => line?,
                None => break,
            };

            let message = line.trim();
            if message.is_empty() {
                continue;
            }

            // A failed generation ends neither the loop nor the session
            match orchestrator.handle_turn(&self.session, message).await {
                Ok(outcome) => self.print_outcome(&outcome)?,
                Err(e) => {
                    tracing::error!("Turn failed: {}", e);
                    println!("{}", TURN_FAILURE_MESSAGE);
                }
            }
        }

        Ok(())
    }

    /// Print one turn outcome in the selected format.
    fn print_outcome(&self, outcome: &TurnOutcome) -> AppResult<()> {
        if self.json {
            let json = serde_json::to_string_pretty(outcome)?;
            println!("{}", json);
            return Ok(());
        }

        println!("{}", outcome.answer);

        if !outcome.sources_used.is_empty() {
            println!();
            println!("Sources:");
            for source in &outcome.sources_used {
                println!("  [{}] {}", source.source_type, source.title);
            }
        }

        if outcome.bias.is_biased {
            if let Some(ref rationale) = outcome.bias.rationale {
                tracing::info!("Bias handling applied: {}", rationale);
            }
        }

        if outcome.degraded {
            tracing::warn!("Turn completed in degraded mode (partial grounding)");
        }

        Ok(())
    }
}
