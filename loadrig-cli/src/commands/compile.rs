//! `loadrig compile`: profile file to k6 script

use std::path::Path;

use anyhow::{Context, Result};
use loadrig_execution::compile_context;
use loadrig_script::ScriptCompiler;
use loadrig_storage::load_profile_file;
use tracing::info;

pub async fn compile_profile(path: &Path, output: Option<&Path>, options_only: bool) -> Result<()> {
    let profile = load_profile_file(path)
        .await
        .with_context(|| format!("Failed to load profile {}", path.display()))?;
    let context = compile_context(&profile).await?;
    let script = ScriptCompiler::new().compile(&profile, &context)?;
    info!(
        "Compiled profile {} ({} / {})",
        script.profile_id(),
        script.category(),
        script.sub_mode()
    );

    let text = if options_only {
        serde_json::to_string_pretty(script.options())?
    } else {
        script.into_text()
    };

    match output {
        Some(output) => {
            tokio::fs::write(output, &text)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Script written to {}", output.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
