//! cached-venv CLI entry point that dispatches to subcommands.

use cached_venv::cli::{Cli, Commands};
use cached_venv::config::ConfigManager;
use cached_venv::error::VenvResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
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

async fn run() -> VenvResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("cached_venv=warn"),
        1 => EnvFilter::new("cached_venv=info"),
        _ => EnvFilter::new("cached_venv=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Loaded config from {}", config_manager.path().display());

    match cli.command {
        Commands::Provision(args) => cached_venv::cli::commands::provision(args, &config).await,
        Commands::Key(args) => cached_venv::cli::commands::key(args, &config).await,
        Commands::Save(args) => cached_venv::cli::commands::save(args, &config).await,
        Commands::Cache(args) => cached_venv::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            cached_venv::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
