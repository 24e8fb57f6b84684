use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use loadrig_config::{ConfigLoader, LoadrigConfig, LogLevel};
use loadrig_logging::{init_logging_from_config, init_simple_tracing};
use loadrig_server::Server;
use tracing::{debug, info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<LoadrigConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Initialize logging from configuration with fallback to simple tracing
fn init_logging_with_config(config: &LoadrigConfig, log_level: Option<&String>) -> Result<()> {
    // If CLI log level is provided, override config level
    let mut logging_config = config.logging.clone();
    if let Some(level_str) = log_level {
        if let Ok(level) = level_str.parse::<LogLevel>() {
            logging_config.level = level;
        }
    }

    if let Err(e) = init_logging_from_config(&logging_config) {
        eprintln!(
            "Failed to initialize structured logging: {}, falling back to simple tracing",
            e
        );
        init_simple_tracing(logging_config.level.as_str())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration first
    let config = load_config(cli.config.as_ref())?;
    init_logging_with_config(&config, cli.log_level.as_ref())?;
    debug!("loadrig CLI starting");

    match &cli.command {
        Commands::Serve => {
            info!("Starting loadrig server");
            Server::new(config).await?.start().await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { profile, json } => commands::run_profile(&config, profile, *json).await,
        Commands::Compile {
            profile,
            output,
            options_only,
        } => {
            commands::compile_profile(profile, output.as_deref(), *options_only).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { config_cmd } => {
            match config_cmd {
                ConfigCommands::Sample { output, force } => {
                    commands::handle_config_sample(output.as_deref(), *force)?
                }
                ConfigCommands::Validate { config_file } => {
                    commands::handle_config_validate(config_file)?
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
