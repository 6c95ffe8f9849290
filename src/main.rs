//! Gantry - Fast Job Inspection
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use gantry::cli::{Cli, Commands};
use gantry::config::ConfigManager;
use gantry::error::GantryResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GantryResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("gantry=warn"),
        1 => EnvFilter::new("gantry=info"),
        _ => EnvFilter::new("gantry=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let mut config = config_manager.load().await?;

    // Command-line overrides win over the config file
    if cli.base_url.is_some() {
        config.remote.base_url = cli.base_url.clone();
    }
    if cli.token.is_some() {
        config.remote.token = cli.token.clone();
    }

    // Ensure state directories exist
    ConfigManager::ensure_state_dirs().await?;

    // Dispatch to command
    match cli.command {
        Commands::Job(args) => gantry::cli::commands::job(args, &config).await,
        Commands::Cache(args) => gantry::cli::commands::cache(args, &config).await,
    }
}
