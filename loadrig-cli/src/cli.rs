//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loadrig", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Run a profile file against k6 and stream its events
    Run {
        /// Profile file (YAML or JSON)
        #[arg(value_name = "PROFILE")]
        profile: PathBuf,

        /// Print events as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compile a profile file into a k6 script without running it
    Compile {
        /// Profile file (YAML or JSON)
        #[arg(value_name = "PROFILE")]
        profile: PathBuf,

        /// Write the script here instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print only the generated k6 options object
        #[arg(long)]
        options_only: bool,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a sample configuration with every default filled in
    Sample {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(value_name = "PATH")]
        config_file: PathBuf,
    },
}
