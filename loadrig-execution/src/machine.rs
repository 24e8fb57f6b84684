//! Execution state machine
//!
//! One task per execution drives `Pending -> Running -> Completed | Failed`,
//! reading the runner's output, publishing observer events and persisting
//! the terminal record exactly once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use loadrig_core::{
    EventPayload, Execution, ExecutionStatus, FailureReason, ObserverEvent, OutputStream,
    Severity,
};
use loadrig_interfaces::{ResultPersister, TerminalUpdate};
use loadrig_ipc::{classify, LineKind, OutputLine, SummaryCollector};
use loadrig_script::CompiledScript;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::RunnerError;
use crate::hub::EventHub;
use crate::process::{ExitOutcome, ProcessLauncher, RunEnvironment, RunnerProcess};

/// Requests sent to a running execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Stop { by: String },
}

/// Run-time policy for one execution
#[derive(Debug, Clone)]
pub struct MachinePolicy {
    pub stop_on_failure: bool,
    pub max_run_duration: Option<Duration>,
    pub max_log_bytes: usize,
}

/// Bounded tail of the runner output
#[derive(Debug)]
struct LogTail {
    lines: VecDeque<String>,
    bytes: usize,
    cap: usize,
}

impl LogTail {
    fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            cap,
        }
    }

    fn push(&mut self, line: &OutputLine) {
        let entry = format!("[{}] {}", line.stream, line.text);
        self.bytes += entry.len() + 1;
        self.lines.push_back(entry);
        while self.bytes > self.cap {
            match self.lines.pop_front() {
                Some(dropped) => self.bytes -= dropped.len() + 1,
                None => break,
            }
        }
    }

    fn into_string(self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(self.bytes);
        for line in self.lines {
            out.push_str(&line);
            out.push('\n');
        }
        Some(out)
    }
}

/// Collaborators shared by every execution
#[derive(Clone)]
pub struct RunServices {
    pub launcher: Arc<dyn ProcessLauncher>,
    pub persister: Arc<dyn ResultPersister>,
    pub hub: Arc<EventHub>,
}

/// Drives a single execution from start to its terminal record
pub struct ExecutionMachine {
    record: Execution,
    script: CompiledScript,
    env: RunEnvironment,
    policy: MachinePolicy,
    services: RunServices,
    control: mpsc::Receiver<ControlMessage>,
}

/// Mutable state of the read loop
struct RunState {
    collector: SummaryCollector,
    tail: LogTail,
    abort: Option<FailureReason>,
    last_progress: Option<String>,
}

impl ExecutionMachine {
    pub fn new(
        record: Execution,
        script: CompiledScript,
        env: RunEnvironment,
        policy: MachinePolicy,
        services: RunServices,
        control: mpsc::Receiver<ControlMessage>,
    ) -> Self {
        Self {
            record,
            script,
            env,
            policy,
            services,
            control,
        }
    }

    fn publish(&self, event: ObserverEvent) {
        if let Err(e) = self.services.hub.publish(event) {
            debug!("Dropping event for execution {}: {}", self.record.id, e);
        }
    }

    /// Run to completion and return the terminal record
    pub async fn run(mut self) -> Execution {
        let id = self.record.id;

        let mut process = match self.services.launcher.start(&self.script, &self.env).await {
            Ok(process) => process,
            Err(e) => {
                error!("Execution {} failed to start: {}", id, e);
                let message = match e {
                    RunnerError::Spawn(message) | RunnerError::Io(message) => message,
                    other => other.to_string(),
                };
                let state = RunState {
                    collector: SummaryCollector::new(),
                    tail: LogTail::new(self.policy.max_log_bytes),
                    abort: Some(FailureReason::Spawn { message }),
                    last_progress: None,
                };
                return self.finish(state, None, None).await;
            }
        };

        if let Err(e) = self.record.transition(ExecutionStatus::Running) {
            warn!("Execution {}: {}", id, e);
        }
        info!(
            "Execution {} running (profile {}, pid {:?})",
            id,
            self.record.profile_id,
            process.pid()
        );
        self.publish(
            ObserverEvent::status(id, ExecutionStatus::Running).with_level(Severity::Info),
        );
        self.publish(ObserverEvent::new(
            id,
            EventPayload::ScriptPreview {
                script: self.script.text().to_string(),
            },
        ));
        self.publish(ObserverEvent::log(
            id,
            OutputStream::Orchestrator,
            format!("Running: {}", self.env.command_line()),
        ));

        let mut state = RunState {
            collector: SummaryCollector::new(),
            tail: LogTail::new(self.policy.max_log_bytes),
            abort: None,
            last_progress: None,
        };
        let run_deadline = self.policy.max_run_duration.map(|d| Instant::now() + d);
        let mut control_open = true;
        let mut output_done = false;

        loop {
            let kill_deadline = process.kill_deadline();
            tokio::select! {
                line = process.next_line() => match line {
                    Some(Ok(line)) => self.handle_line(&mut state, process.as_mut(), line),
                    Some(Err(e)) => {
                        error!("Execution {} lost runner output: {}", id, e);
                        self.request_termination(
                            &mut state,
                            process.as_mut(),
                            FailureReason::RunnerIo { message: e.to_string() },
                        );
                    }
                    None => {
                        output_done = true;
                        break;
                    }
                },
                message = self.control.recv(), if control_open => match message {
                    Some(ControlMessage::Stop { by }) => {
                        info!("Execution {} stop requested by {}", id, by);
                        self.request_termination(
                            &mut state,
                            process.as_mut(),
                            FailureReason::Aborted { by },
                        );
                    }
                    None => control_open = false,
                },
                _ = until(run_deadline), if state.abort.is_none() => {
                    let limit = self.policy.max_run_duration.unwrap_or_default();
                    warn!("Execution {} exceeded its {:?} run limit", id, limit);
                    self.request_termination(
                        &mut state,
                        process.as_mut(),
                        FailureReason::TimedOut {
                            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        },
                    );
                }
                _ = until(kill_deadline), if kill_deadline.is_some() => {
                    debug!("Execution {} kill deadline reached with pipes open", id);
                    break;
                }
            }
        }

        let outcome = process.wait().await;

        if !output_done {
            while let Some(line) = process.next_line().await {
                match line {
                    Ok(line) => self.handle_line(&mut state, process.as_mut(), line),
                    Err(e) => {
                        debug!("Execution {} output error after exit: {}", id, e);
                        break;
                    }
                }
            }
        }

        let artifact = process.artifact().map(|p| p.to_path_buf());
        drop(process);

        match outcome {
            Ok(outcome) => self.finish(state, Some(outcome), artifact).await,
            Err(e) => {
                error!("Execution {} could not be reaped: {}", id, e);
                if state.abort.is_none() {
                    state.abort = Some(FailureReason::RunnerIo {
                        message: e.to_string(),
                    });
                }
                self.finish(state, None, artifact).await
            }
        }
    }

    fn handle_line(&self, state: &mut RunState, process: &mut dyn RunnerProcess, line: OutputLine) {
        let id = self.record.id;
        if state.collector.feed(&line) {
            return;
        }
        state.tail.push(&line);

        let kind = classify(&line);
        if kind == LineKind::Progress {
            state.last_progress = Some(line.text.clone());
            self.publish(ObserverEvent::progress(id, line.text));
            return;
        }

        if self.policy.stop_on_failure {
            if let Some(check) = kind.violated_check() {
                warn!("Execution {} violated '{}', stopping", id, check);
                self.request_termination(state, process, FailureReason::PolicyAbort { check });
            }
        }

        let mut event = ObserverEvent::log(id, line.stream, line.text);
        if let Some(level) = kind.severity() {
            event = event.with_level(level);
        }
        self.publish(event);
    }

    /// Terminate once; later requests keep the first reason
    fn request_termination(
        &self,
        state: &mut RunState,
        process: &mut dyn RunnerProcess,
        reason: FailureReason,
    ) {
        if state.abort.is_some() {
            debug!(
                "Execution {} already terminating, ignoring {}",
                self.record.id, reason
            );
            return;
        }
        self.publish(
            ObserverEvent::log(
                self.record.id,
                OutputStream::Orchestrator,
                format!("Stopping runner: {reason}"),
            )
            .with_level(Severity::Warning),
        );
        state.abort = Some(reason);
        match process.terminate() {
            Ok(()) => {}
            Err(RunnerError::NotRunning) => {
                debug!("Execution {} runner already exited", self.record.id)
            }
            Err(e) => warn!("Execution {} terminate failed: {}", self.record.id, e),
        }
    }

    async fn finish(
        mut self,
        state: RunState,
        outcome: Option<ExitOutcome>,
        artifact: Option<std::path::PathBuf>,
    ) -> Execution {
        let id = self.record.id;
        // Stop requests from here on are refused rather than queued
        self.control.close();
        let RunState {
            collector,
            tail,
            abort,
            last_progress,
        } = state;

        let summary = collector.finish();
        let failure = match (abort, outcome) {
            (Some(reason), _) => Some(reason),
            (None, Some(ExitOutcome { signal: Some(signal), .. })) => {
                Some(FailureReason::KilledBySignal { signal })
            }
            (None, Some(outcome)) if outcome.success() => None,
            (None, Some(outcome)) => Some(FailureReason::ExitCode {
                code: outcome.code.unwrap_or(-1),
            }),
            (None, None) => Some(FailureReason::RunnerIo {
                message: "runner exit status unavailable".to_string(),
            }),
        };
        let status = if failure.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        if let Err(e) = self.record.transition(status) {
            warn!("Execution {}: {}", id, e);
        }
        self.record.exit_code = outcome.and_then(|o| o.code);
        self.record.failure = failure.clone();
        self.record.artifact = artifact;
        self.record.summary_unavailable = summary.is_none() && outcome.is_some();
        self.record.summary = summary;
        self.record.logs = tail.into_string();

        if let Err(e) = self
            .services
            .persister
            .update_execution(id, TerminalUpdate::from_execution(&self.record))
            .await
        {
            error!("Failed to persist execution {}: {}", id, e);
        }

        if self.record.summary_unavailable {
            warn!("Execution {} ended without a runner summary", id);
            self.publish(ObserverEvent::info(id, "Runner summary unavailable"));
        }

        match &failure {
            None => {
                info!("Execution {} completed", id);
                self.publish(
                    ObserverEvent::new(
                        id,
                        EventPayload::Result {
                            success: true,
                            summary: self.record.summary.clone(),
                            artifact: self.record.artifact.clone(),
                        },
                    )
                    .with_level(Severity::Success)
                    .with_message("Test completed"),
                );
            }
            Some(reason) => {
                warn!("Execution {} failed: {}", id, reason);
                self.publish(
                    ObserverEvent::new(
                        id,
                        EventPayload::Error {
                            reason: reason.clone(),
                            exit_code: self.record.exit_code,
                            last_status: last_progress,
                        },
                    )
                    .with_level(Severity::Error)
                    .with_message(reason.to_string()),
                );
            }
        }

        self.publish(ObserverEvent::status(id, status));
        if let Err(e) = self.services.hub.close(id) {
            debug!("Closing topic for execution {}: {}", id, e);
        }
        self.record
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
