//! Execution orchestration
//!
//! [`ExecutionManager`] is the entry point for starting, stopping and
//! observing runs. It compiles the profile up front so invalid profiles
//! fail synchronously, records the pending execution, and hands the rest
//! to an [`ExecutionMachine`] task.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use loadrig_config::RunnerConfig;
use loadrig_core::{
    EventPayload, Execution, ExecutionId, ExecutionStatus, ObserverEvent, ProfileId, Severity,
    TestProfile,
};
use loadrig_interfaces::ProfileStore;
use loadrig_script::{CompileContext, CompileError, CompiledScript, ScriptCompiler};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{HubError, OrchestratorError, OrchestratorResult};
use crate::hub::{EventHub, Subscription};
use crate::machine::{ControlMessage, ExecutionMachine, MachinePolicy, RunServices};
use crate::process::RunEnvironment;

/// Substitution variable holding the start time in epoch milliseconds
pub const TIMESTAMP_VARIABLE: &str = "timestamp";

struct ActiveRun {
    control: mpsc::Sender<ControlMessage>,
    handle: JoinHandle<Execution>,
}

/// Starts, stops and tracks executions
pub struct ExecutionManager {
    profiles: Arc<dyn ProfileStore>,
    services: RunServices,
    runner: RunnerConfig,
    compiler: ScriptCompiler,
    active: Arc<RwLock<HashMap<ExecutionId, ActiveRun>>>,
}

impl ExecutionManager {
    pub fn new(profiles: Arc<dyn ProfileStore>, services: RunServices, runner: RunnerConfig) -> Self {
        Self {
            profiles,
            services,
            runner,
            compiler: ScriptCompiler::new(),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a stored profile
    pub async fn start(&self, profile_id: &ProfileId) -> OrchestratorResult<ExecutionId> {
        let profile = self.get_profile(profile_id).await?;
        self.start_profile(profile).await
    }

    /// Start a profile that need not be stored
    pub async fn start_profile(&self, profile: TestProfile) -> OrchestratorResult<ExecutionId> {
        let script = self.preview(&profile).await?;

        let record = Execution::new(profile.id.clone(), profile.name.clone());
        let id = record.id;
        self.services.persister.save_execution(&record).await?;
        self.services.hub.open(id, ExecutionStatus::Pending)?;
        self.services.hub.publish(
            ObserverEvent::new(
                id,
                EventPayload::ExecutionStarted {
                    profile_id: profile.id.clone(),
                },
            )
            .with_level(Severity::Info)
            .with_message(format!("Starting {}", profile.name)),
        )?;

        let policy = MachinePolicy {
            stop_on_failure: profile.stop_on_failure,
            max_run_duration: self.runner.max_run_duration,
            max_log_bytes: self.runner.max_log_bytes,
        };
        let env = RunEnvironment::new(id, &self.runner);
        let (control_tx, control_rx) = mpsc::channel(4);
        let machine = ExecutionMachine::new(
            record,
            script,
            env,
            policy,
            self.services.clone(),
            control_rx,
        );

        // Registered under the lock so the task cannot deregister before insertion
        let mut active = self.active.write().await;
        let registry = Arc::clone(&self.active);
        let handle = tokio::spawn(async move {
            let record = machine.run().await;
            registry.write().await.remove(&record.id);
            record
        });
        active.insert(
            id,
            ActiveRun {
                control: control_tx,
                handle,
            },
        );
        drop(active);

        info!("Started execution {} for profile {}", id, profile.id);
        Ok(id)
    }

    /// Ask a running execution to stop
    pub async fn stop(&self, id: ExecutionId) -> OrchestratorResult<()> {
        let control = {
            let active = self.active.read().await;
            active.get(&id).map(|run| run.control.clone())
        };
        let control = control.ok_or(OrchestratorError::NotRunning(id))?;
        control
            .send(ControlMessage::Stop {
                by: "user".to_string(),
            })
            .await
            .map_err(|_| OrchestratorError::NotRunning(id))?;
        debug!("Stop sent to execution {}", id);
        Ok(())
    }

    /// Observe an execution, live or finished
    pub async fn subscribe(&self, id: ExecutionId) -> OrchestratorResult<Subscription> {
        match self.services.hub.subscribe(id) {
            Ok(subscription) => Ok(subscription),
            Err(HubError::UnknownExecution(_)) => {
                let record = self.get(id).await?;
                debug!(
                    "Execution {} no longer on the hub, replaying persisted status",
                    id
                );
                Ok(Subscription::finished(ObserverEvent::status(
                    id,
                    record.status,
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: ExecutionId) -> OrchestratorResult<Execution> {
        self.services
            .persister
            .get_execution(id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    OrchestratorError::ExecutionNotFound(id)
                } else {
                    OrchestratorError::Store(e)
                }
            })
    }

    pub async fn list(&self) -> OrchestratorResult<Vec<Execution>> {
        Ok(self.services.persister.list_executions().await?)
    }

    pub async fn list_profiles(&self) -> OrchestratorResult<Vec<TestProfile>> {
        Ok(self.profiles.list_profiles().await?)
    }

    pub async fn get_profile(&self, id: &ProfileId) -> OrchestratorResult<TestProfile> {
        self.profiles.get_profile(id).await.map_err(|e| {
            if e.is_not_found() {
                OrchestratorError::ProfileNotFound(id.clone())
            } else {
                OrchestratorError::Store(e)
            }
        })
    }

    /// Compile without running
    pub async fn preview(&self, profile: &TestProfile) -> OrchestratorResult<CompiledScript> {
        let context = compile_context(profile).await?;
        Ok(self.compiler.compile(profile, &context)?)
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    pub async fn is_active(&self, id: ExecutionId) -> bool {
        self.active.read().await.contains_key(&id)
    }

    /// Stop every active run and wait for their terminal records
    pub async fn shutdown(&self) -> Vec<Execution> {
        let runs: Vec<(ExecutionId, ActiveRun)> = self.active.write().await.drain().collect();
        if runs.is_empty() {
            return Vec::new();
        }
        info!("Shutting down {} active executions", runs.len());

        for (id, run) in &runs {
            let stop = ControlMessage::Stop {
                by: "shutdown".to_string(),
            };
            if run.control.send(stop).await.is_err() {
                debug!("Execution {} finished before shutdown reached it", id);
            }
        }

        let mut finished = Vec::with_capacity(runs.len());
        for (id, run) in runs {
            match run.handle.await {
                Ok(record) => finished.push(record),
                Err(e) => warn!("Execution {} task ended abnormally: {}", id, e),
            }
        }
        finished
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.services.hub
    }
}

/// Caller-side dynamic values for a compile: the start timestamp and
/// the data file's header columns
pub async fn compile_context(profile: &TestProfile) -> Result<CompileContext, CompileError> {
    let mut context = CompileContext::new().with_variable(
        TIMESTAMP_VARIABLE,
        Utc::now().timestamp_millis().to_string(),
    );
    if let Some(path) = &profile.data_file {
        context = context.with_data_columns(read_csv_header(path).await?);
    }
    Ok(context)
}

/// Column names from a CSV data file's header row
async fn read_csv_header(path: &Path) -> Result<Vec<String>, CompileError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        CompileError::invalid(format!("cannot read data file {}: {}", path.display(), e))
    })?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers().map_err(|e| {
        CompileError::invalid(format!("invalid data file {}: {}", path.display(), e))
    })?;
    let columns: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if columns.is_empty() {
        return Err(CompileError::invalid(format!(
            "data file {} has no header columns",
            path.display()
        )));
    }
    Ok(columns)
}
