//! `loadrig run`: one profile, events streamed to the terminal

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use loadrig_config::LoadrigConfig;
use loadrig_core::{EventPayload, Execution, ExecutionStatus, ObserverEvent, OutputStream};
use loadrig_server::build_manager;
use loadrig_storage::load_profile_file;
use tracing::{debug, info, warn};

pub async fn run_profile(config: &LoadrigConfig, path: &Path, json: bool) -> Result<ExitCode> {
    let profile = load_profile_file(path)
        .await
        .with_context(|| format!("Failed to load profile {}", path.display()))?;
    let manager = build_manager(config).await?;

    let id = manager.start_profile(profile).await?;
    info!("Execution {} started", id);
    let mut subscription = manager.subscribe(id).await?;

    let mut stop_requested = false;
    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => print_event(&event, json)?,
                None => break,
            },
            interrupted = tokio::signal::ctrl_c(), if !stop_requested => {
                stop_requested = true;
                if let Err(e) = interrupted {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    continue;
                }
                warn!("Interrupted, stopping execution {}", id);
                if let Err(e) = manager.stop(id).await {
                    debug!("Stop not delivered: {}", e);
                }
            }
        }
    }

    let record = manager.get(id).await?;
    if json {
        println!("{}", serde_json::to_string(&record)?);
    } else {
        print_outcome(&record);
    }

    Ok(if record.status == ExecutionStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_event(event: &ObserverEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if let Some(line) = render_event(event) {
        println!("{}", line);
    }
    Ok(())
}

/// Human-readable form of an event; `None` for events not worth a line
fn render_event(event: &ObserverEvent) -> Option<String> {
    match &event.payload {
        EventPayload::ExecutionStarted { profile_id } => Some(format!(
            "{} {}",
            "▶".cyan(),
            event
                .message
                .clone()
                .unwrap_or_else(|| format!("Starting {}", profile_id))
        )),
        EventPayload::Status { status, progress } => match progress {
            Some(progress) => Some(format!("{} {}", "…".dimmed(), progress)),
            None => Some(format!("{} {}", "status".cyan(), status)),
        },
        EventPayload::Log { stream, line } => Some(match stream {
            OutputStream::Stderr => format!("{} {}", "[stderr]".yellow(), line),
            other => format!("[{}] {}", other, line),
        }),
        EventPayload::ScriptPreview { script } => {
            debug!("Generated script:\n{}", script);
            None
        }
        EventPayload::Info => event.message.clone(),
        EventPayload::Result { success, .. } => Some(if *success {
            format!("{} Test completed", "✔".green())
        } else {
            format!("{} Test finished unsuccessfully", "✘".red())
        }),
        EventPayload::Error {
            reason,
            exit_code,
            last_status,
        } => {
            let mut line = format!("{} {}", "✘".red(), reason);
            if let Some(code) = exit_code {
                line.push_str(&format!(" (exit code {})", code));
            }
            if let Some(last) = last_status {
                line.push_str(&format!("\n  last status: {}", last));
            }
            Some(line)
        }
    }
}

fn print_outcome(record: &Execution) {
    println!();
    println!("{} {} ({})", "Execution".bold(), record.id, record.status);
    if let Some(summary) = &record.summary {
        println!(
            "  requests: {}  failed: {:.2}%  rps: {:.1} (max {:.1})",
            summary.http_reqs,
            summary.failed_rate * 100.0,
            summary.rps,
            summary.rps_max
        );
        println!(
            "  latency ms: avg {:.1}  p90 {:.1}  p95 {:.1}  max {:.1}",
            summary.latency.avg, summary.latency.p90, summary.latency.p95, summary.latency.max
        );
    } else if record.summary_unavailable {
        println!("  runner summary unavailable");
    }
    if let Some(failure) = &record.failure {
        println!("  {} {}", "failure:".red(), failure);
    }
    if let Some(artifact) = &record.artifact {
        println!("  artifact: {}", artifact.display());
    }
}
