//! Asha CLI
//!
//! Main entry point for the asha command-line tool.
//! A conversational career assistant grounded in job listings and
//! community events, with gender-bias screening on every query.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BiasCheckCommand, ChatCommand, EventsCommand, IndexCommand, StatsCommand};
use asha_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Asha CLI - career assistant with retrieval-grounded answers
#[derive(Parser, Debug)]
#[command(name = "asha")]
#[command(about = "Career assistant grounded in job listings and community events", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ASHA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ASHA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (openrouter, ollama)
    #[arg(short, long, global = true, env = "ASHA_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ASHA_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the assistant (one message, or interactive on stdin)
    Chat(ChatCommand),

    /// Screen a message for gender-biased framing
    BiasCheck(BiasCheckCommand),

    /// Build the job and event indexes from record files
    Index(IndexCommand),

    /// List upcoming community events
    Events(EventsCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    // Log startup
    tracing::info!("Asha CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    // Ensure .asha directory exists
    config.ensure_asha_dir()?;

    let command_name = match &cli.command {
        Commands::Chat(_) => "chat",
        Commands::BiasCheck(_) => "bias-check",
        Commands::Index(_) => "index",
        Commands::Events(_) => "events",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::BiasCheck(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Events(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
