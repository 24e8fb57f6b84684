//! Subcommand implementations

pub mod compile;
pub mod config;
pub mod run;

pub use compile::compile_profile;
pub use config::{handle_config_sample, handle_config_validate};
pub use run::run_profile;
