//! k6 runner process management
//!
//! A [`ProcessLauncher`] writes the compiled script to disk and starts the
//! runner. The resulting [`RunnerProcess`] exposes the merged stdout and
//! stderr lines, cooperative termination (SIGTERM to the process group,
//! SIGKILL once the grace period has passed) and the exit outcome.
//!
//! Output is read until both pipes close or, once the runner itself has
//! exited, until the grace period runs out. Whatever is left of the
//! process group is killed at that point, so a descendant holding a pipe
//! open cannot keep an execution alive.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use loadrig_config::RunnerConfig;
use loadrig_core::{ExecutionId, OutputStream};
use loadrig_ipc::{spawn_line_reader, IpcError, OutputLine};
use loadrig_script::CompiledScript;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::RunnerError;

/// Everything a launcher needs to know about one run
#[derive(Debug, Clone)]
pub struct RunEnvironment {
    pub execution_id: ExecutionId,
    pub binary: PathBuf,
    pub scripts_dir: PathBuf,
    pub results_dir: PathBuf,
    pub grace_period: Duration,
    pub extra_args: Vec<String>,
    pub line_buffer: usize,
}

impl RunEnvironment {
    pub fn new(execution_id: ExecutionId, config: &RunnerConfig) -> Self {
        Self {
            execution_id,
            binary: config.binary.clone(),
            scripts_dir: config.scripts_dir.clone(),
            results_dir: config.results_dir.clone(),
            grace_period: config.grace_period,
            extra_args: config.extra_args.clone(),
            line_buffer: config.line_buffer.max(1),
        }
    }

    /// Where the compiled script is written
    pub fn script_path(&self) -> PathBuf {
        self.scripts_dir.join(format!("{}.js", self.execution_id))
    }

    /// Where the runner writes its raw JSON result stream
    pub fn artifact_path(&self) -> PathBuf {
        self.results_dir
            .join(format!("result_{}.json", self.execution_id))
    }

    /// Runner arguments, script path last
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--out".to_string(),
            format!("json={}", self.artifact_path().display()),
            "--no-color".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push(self.script_path().display().to_string());
        args
    }

    /// Human-readable command line, for logs
    pub fn command_line(&self) -> String {
        let mut line = self.binary.display().to_string();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// How a runner process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// A started runner
#[async_trait]
pub trait RunnerProcess: Send {
    /// Next output line from either pipe; `None` once both have closed or
    /// the post-exit drain window has passed. Cancel-safe.
    async fn next_line(&mut self) -> Option<Result<OutputLine, RunnerError>>;

    /// Ask the runner to stop and arm the kill deadline
    fn terminate(&mut self) -> Result<(), RunnerError>;

    /// When the process group gets SIGKILL, if termination was requested
    fn kill_deadline(&self) -> Option<Instant>;

    /// Wait for exit, enforcing the kill deadline
    async fn wait(&mut self) -> Result<ExitOutcome, RunnerError>;

    fn pid(&self) -> Option<u32>;

    /// Raw result file the runner writes
    fn artifact(&self) -> Option<&Path>;
}

/// Starts runner processes
///
/// Dropping a returned process kills whatever remains of its process group.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn start(
        &self,
        script: &CompiledScript,
        env: &RunEnvironment,
    ) -> Result<Box<dyn RunnerProcess>, RunnerError>;
}

/// Launches the real k6 binary
#[derive(Debug, Clone, Default)]
pub struct K6Launcher;

impl K6Launcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for K6Launcher {
    async fn start(
        &self,
        script: &CompiledScript,
        env: &RunEnvironment,
    ) -> Result<Box<dyn RunnerProcess>, RunnerError> {
        let script_path = env.script_path();

        tokio::fs::create_dir_all(&env.scripts_dir).await.map_err(|e| {
            RunnerError::Spawn(format!(
                "cannot create scripts directory {}: {}",
                env.scripts_dir.display(),
                e
            ))
        })?;
        tokio::fs::create_dir_all(&env.results_dir).await.map_err(|e| {
            RunnerError::Spawn(format!(
                "cannot create results directory {}: {}",
                env.results_dir.display(),
                e
            ))
        })?;
        tokio::fs::write(&script_path, script.text())
            .await
            .map_err(|e| {
                RunnerError::Spawn(format!(
                    "cannot write script {}: {}",
                    script_path.display(),
                    e
                ))
            })?;

        let mut command = Command::new(&env.binary);
        command
            .args(env.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            RunnerError::Spawn(format!("cannot execute {}: {}", env.binary.display(), e))
        })?;
        let pid = child.id();
        info!(
            "Started runner for execution {} (pid {:?}): {}",
            env.execution_id,
            pid,
            env.command_line()
        );

        let (tx, rx) = mpsc::channel(env.line_buffer);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, OutputStream::Stderr, tx));
        }

        Ok(Box::new(K6Process {
            child,
            pid,
            lines: rx,
            readers,
            grace_period: env.grace_period,
            kill_deadline: None,
            exit: None,
            drain_deadline: None,
            output_closed: false,
            artifact: env.artifact_path(),
        }))
    }
}

/// A running k6 child in its own process group
pub struct K6Process {
    child: Child,
    pid: Option<u32>,
    lines: mpsc::Receiver<Result<OutputLine, IpcError>>,
    readers: Vec<JoinHandle<()>>,
    grace_period: Duration,
    kill_deadline: Option<Instant>,
    exit: Option<ExitOutcome>,
    /// Armed when the leader exits; output stops being read after it
    drain_deadline: Option<Instant>,
    output_closed: bool,
    artifact: PathBuf,
}

impl K6Process {
    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return;
        };
        if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
            debug!("Failed to send {} to process group {}: {}", signal, pid, e);
        }
    }

    fn record_exit(&mut self, status: std::process::ExitStatus) -> ExitOutcome {
        let outcome = ExitOutcome::from(status);
        if self.exit.is_none() {
            debug!("Runner pid {:?} exited: {:?}", self.pid, outcome);
            self.exit = Some(outcome);
            self.drain_deadline = Some(Instant::now() + self.grace_period);
        }
        outcome
    }

    fn has_exited(&mut self) -> bool {
        if self.exit.is_some() {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                true
            }
            _ => false,
        }
    }

    /// Stop reading output and kill any stragglers in the group
    fn close_output(&mut self) {
        if self.output_closed {
            return;
        }
        self.output_closed = true;
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL);
        for reader in &self.readers {
            reader.abort();
        }
        self.lines.close();
    }
}

#[async_trait]
impl RunnerProcess for K6Process {
    async fn next_line(&mut self) -> Option<Result<OutputLine, RunnerError>> {
        loop {
            if self.output_closed {
                return None;
            }
            if let Some(deadline) = self.drain_deadline {
                tokio::select! {
                    line = self.lines.recv() => {
                        return line.map(|line| line.map_err(RunnerError::from));
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        warn!(
                            "Runner pid {:?} exited but its output is still open, killing process group",
                            self.pid
                        );
                        self.close_output();
                        return None;
                    }
                }
            }
            tokio::select! {
                line = self.lines.recv() => {
                    return line.map(|line| line.map_err(RunnerError::from));
                }
                status = self.child.wait() => match status {
                    Ok(status) => {
                        self.record_exit(status);
                    }
                    Err(e) => {
                        self.drain_deadline = Some(Instant::now() + self.grace_period);
                        return Some(Err(RunnerError::from(e)));
                    }
                },
            }
        }
    }

    fn terminate(&mut self) -> Result<(), RunnerError> {
        if self.has_exited() {
            return Err(RunnerError::NotRunning);
        }
        if self.kill_deadline.is_some() {
            return Ok(());
        }

        info!(
            "Terminating runner pid {:?}, forced kill in {:?}",
            self.pid, self.grace_period
        );
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGTERM);
        #[cfg(not(unix))]
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill runner: {}", e);
        }

        self.kill_deadline = Some(Instant::now() + self.grace_period);
        Ok(())
    }

    fn kill_deadline(&self) -> Option<Instant> {
        self.kill_deadline
    }

    async fn wait(&mut self) -> Result<ExitOutcome, RunnerError> {
        if let Some(outcome) = self.exit {
            return Ok(outcome);
        }
        let status = match self.kill_deadline {
            Some(deadline) => {
                tokio::select! {
                    status = self.child.wait() => status?,
                    _ = tokio::time::sleep_until(deadline) => {
                        warn!("Runner pid {:?} outlived its grace period, killing", self.pid);
                        #[cfg(unix)]
                        self.signal_group(nix::sys::signal::Signal::SIGKILL);
                        #[cfg(not(unix))]
                        let _ = self.child.start_kill();
                        self.child.wait().await?
                    }
                }
            }
            None => self.child.wait().await?,
        };
        Ok(self.record_exit(status))
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn artifact(&self) -> Option<&Path> {
        Some(&self.artifact)
    }
}

impl Drop for K6Process {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("Runner pid {:?} dropped while running, killing", self.pid);
        }
        self.close_output();
    }
}
