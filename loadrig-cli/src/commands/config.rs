//! `loadrig config` subcommands

use std::path::Path;

use anyhow::{Context, Result};
use loadrig_config::{ConfigLoader, LoadrigConfig};
use tracing::{error, info};

/// Write or print a sample configuration
pub fn handle_config_sample(output: Option<&Path>, force: bool) -> Result<()> {
    let sample = LoadrigConfig::generate_sample();
    let Some(output) = output else {
        print!("{}", sample);
        return Ok(());
    };

    // Check if file exists and force is not set
    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    println!("✅ Sample configuration written to {:?}", output);
    Ok(())
}

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}
