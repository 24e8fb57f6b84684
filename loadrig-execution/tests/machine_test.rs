//! State machine tests against a scripted runner

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loadrig_config::{HubConfig, RunnerConfig};
use loadrig_core::{
    EventPayload, Execution, ExecutionStatus, FailureReason, LoadShape, ObserverEvent,
    TestProfile,
};
use loadrig_execution::{
    ControlMessage, EventHub, ExecutionMachine, ExitOutcome, MachinePolicy, ProcessLauncher,
    RunEnvironment, RunServices, RunnerError, RunnerProcess,
};
use loadrig_interfaces::ResultPersister;
use loadrig_ipc::OutputLine;
use loadrig_script::{CompileContext, CompiledScript, ScriptCompiler};
use loadrig_storage::testing::MockExecutionRepo;
use loadrig_storage::InMemoryExecutionStore;
use tokio::sync::mpsc;
use tokio::time::Instant;

const SUMMARY: &[&str] = &[
    "{",
    r#"  "state": { "testRunDurationMs": 30004.2 },"#,
    r#"  "metrics": {"#,
    r#"    "http_reqs": { "values": { "count": 300, "rate": 9.99 } },"#,
    r#"    "http_req_failed": { "values": { "rate": 0 } },"#,
    r#"    "http_req_duration": { "values": { "avg": 12.5, "min": 3.1, "max": 98.7, "p(90)": 20.2, "p(95)": 31.4 } },"#,
    r#"    "iterations": { "values": { "count": 300, "rate": 9.99 } },"#,
    r#"    "vus_max": { "values": { "value": 10, "min": 10, "max": 10 } }"#,
    "  }",
    "}",
];

/// What the scripted runner does once its lines run out
#[derive(Clone, Copy)]
enum Ending {
    Exit(ExitOutcome),
    HangUntilTerminated(ExitOutcome),
}

struct ScriptedProcess {
    lines: VecDeque<OutputLine>,
    ending: Ending,
    terminations: Arc<AtomicUsize>,
    terminated: bool,
}

#[async_trait]
impl RunnerProcess for ScriptedProcess {
    async fn next_line(&mut self) -> Option<Result<OutputLine, RunnerError>> {
        if let Some(line) = self.lines.pop_front() {
            return Some(Ok(line));
        }
        if matches!(self.ending, Ending::HangUntilTerminated(_)) && !self.terminated {
            futures::future::pending::<()>().await;
        }
        None
    }

    fn terminate(&mut self) -> Result<(), RunnerError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.terminated = true;
        Ok(())
    }

    fn kill_deadline(&self) -> Option<Instant> {
        None
    }

    async fn wait(&mut self) -> Result<ExitOutcome, RunnerError> {
        match self.ending {
            Ending::Exit(outcome) | Ending::HangUntilTerminated(outcome) => Ok(outcome),
        }
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn artifact(&self) -> Option<&Path> {
        Some(Path::new("results/result_test.json"))
    }
}

struct ScriptedLauncher {
    lines: Vec<OutputLine>,
    ending: Ending,
    fail_spawn: bool,
    terminations: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    fn new(lines: Vec<OutputLine>, ending: Ending) -> Self {
        Self {
            lines,
            ending,
            fail_spawn: false,
            terminations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn start(
        &self,
        _script: &CompiledScript,
        _env: &RunEnvironment,
    ) -> Result<Box<dyn RunnerProcess>, RunnerError> {
        if self.fail_spawn {
            return Err(RunnerError::Spawn("cannot execute k6: not found".to_string()));
        }
        Ok(Box::new(ScriptedProcess {
            lines: self.lines.iter().cloned().collect(),
            ending: self.ending,
            terminations: Arc::clone(&self.terminations),
            terminated: false,
        }))
    }
}

fn exited(code: i32) -> ExitOutcome {
    ExitOutcome {
        code: Some(code),
        signal: None,
    }
}

fn signalled(signal: i32) -> ExitOutcome {
    ExitOutcome {
        code: None,
        signal: Some(signal),
    }
}

fn summary_lines() -> Vec<OutputLine> {
    SUMMARY.iter().map(|l| OutputLine::stdout(*l)).collect()
}

fn profile(stop_on_failure: bool) -> TestProfile {
    TestProfile::new(
        "smoke",
        "Smoke",
        "http://localhost:8080/health",
        LoadShape::ConstantVus {
            vus: 10,
            duration: "30s".to_string(),
        },
    )
    .with_stop_on_failure(stop_on_failure)
}

struct Harness {
    hub: Arc<EventHub>,
    control: mpsc::Sender<ControlMessage>,
    machine: ExecutionMachine,
    record: Execution,
}

fn harness(
    launcher: Arc<dyn ProcessLauncher>,
    persister: Arc<dyn ResultPersister>,
    stop_on_failure: bool,
    max_run_duration: Option<Duration>,
) -> Harness {
    let profile = profile(stop_on_failure);
    let script = ScriptCompiler::new()
        .compile(&profile, &CompileContext::new())
        .unwrap();
    let record = Execution::new(profile.id.clone(), profile.name.clone());
    let hub = Arc::new(EventHub::new(&HubConfig::default()));
    hub.open(record.id, ExecutionStatus::Pending).unwrap();

    let (control, control_rx) = mpsc::channel(4);
    let machine = ExecutionMachine::new(
        record.clone(),
        script,
        RunEnvironment::new(record.id, &RunnerConfig::default()),
        MachinePolicy {
            stop_on_failure,
            max_run_duration,
            max_log_bytes: 1024,
        },
        RunServices {
            launcher,
            persister,
            hub: Arc::clone(&hub),
        },
        control_rx,
    );
    Harness {
        hub,
        control,
        machine,
        record,
    }
}

fn collect(hub: &EventHub, record: &Execution) -> tokio::task::JoinHandle<Vec<ObserverEvent>> {
    let mut sub = hub.subscribe(record.id).unwrap();
    tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = sub.recv().await {
            events.push(event);
        }
        events
    })
}

#[tokio::test]
async fn test_vus_simple_run_completes_with_summary() {
    let mut lines = vec![
        OutputLine::stderr("running (0m05.0s), 10/10 VUs, 50 complete and 0 interrupted iterations"),
        OutputLine::stderr("default   [  50% ] 10 VUs  0m15.0s/0m30s 12.4/s"),
    ];
    lines.extend(summary_lines());
    let launcher = Arc::new(ScriptedLauncher::new(lines, Ending::Exit(exited(0))));

    let mut persister = MockExecutionRepo::new();
    persister
        .expect_update_execution()
        .times(1)
        .withf(|_, update| {
            update.status == ExecutionStatus::Completed
                && update.summary.as_ref().map(|s| s.http_reqs) == Some(300)
                && !update.summary_unavailable
                && update.failure.is_none()
        })
        .returning(|_, _| Ok(()));

    let h = harness(launcher, Arc::new(persister), false, None);
    let events = collect(&h.hub, &h.record);
    let record = h.machine.run().await;
    let events = events.await.unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record.started_at.is_some() && record.ended_at.is_some());
    let summary = record.summary.unwrap();
    assert_eq!(summary.http_reqs, 300);
    assert!(summary.rps_max >= 12.4);

    let statuses: Vec<_> = events
        .iter()
        .filter_map(|e| e.status_value())
        .collect();
    assert_eq!(statuses.first(), Some(&ExecutionStatus::Pending));
    assert_eq!(statuses.last(), Some(&ExecutionStatus::Completed));
    assert!(statuses.windows(2).all(|w| w[0].rank() <= w[1].rank()));

    let previews = events
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::ScriptPreview { .. }))
        .count();
    assert_eq!(previews, 1);

    // summary block lines are consumed, not forwarded
    assert!(!events.iter().any(|e| matches!(
        &e.payload,
        EventPayload::Log { line, .. } if line.contains("http_reqs")
    )));

    let result_pos = events
        .iter()
        .position(|e| matches!(e.payload, EventPayload::Result { success: true, .. }))
        .unwrap();
    assert_eq!(result_pos, events.len() - 2);
}

#[tokio::test]
async fn test_stop_on_failure_terminates_exactly_once() {
    let lines = vec![
        OutputLine::stderr(
            r#"time="2024-01-01T00:00:00Z" level=info msg="[STOP_ON_FAILURE] check=status is 2xx status=500" source=console"#,
        ),
        OutputLine::stderr(
            r#"time="2024-01-01T00:00:00Z" level=info msg="[STOP_ON_FAILURE] check=status is 2xx status=503" source=console"#,
        ),
        OutputLine::stderr(
            r#"time="2024-01-01T00:00:01Z" level=error msg="thresholds on metrics 'errors' have been crossed""#,
        ),
    ];
    let launcher = Arc::new(ScriptedLauncher::new(
        lines,
        Ending::HangUntilTerminated(exited(105)),
    ));
    let terminations = Arc::clone(&launcher.terminations);

    let h = harness(launcher, Arc::new(InMemoryExecutionStore::new()), true, None);
    let record = h.machine.run().await;

    assert_eq!(terminations.load(Ordering::SeqCst), 1);
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(
        record.failure,
        Some(FailureReason::PolicyAbort {
            check: "status is 2xx".to_string()
        })
    );
    assert_eq!(record.exit_code, Some(105));
}

#[tokio::test]
async fn test_threshold_line_aborts_when_stop_on_failure() {
    let lines = vec![OutputLine::stderr(
        r#"level=error msg="thresholds on metrics 'http_req_duration' were crossed""#,
    )];
    let launcher = Arc::new(ScriptedLauncher::new(
        lines,
        Ending::HangUntilTerminated(signalled(15)),
    ));
    let terminations = Arc::clone(&launcher.terminations);

    let h = harness(launcher, Arc::new(InMemoryExecutionStore::new()), true, None);
    let record = h.machine.run().await;

    assert_eq!(terminations.load(Ordering::SeqCst), 1);
    assert_eq!(
        record.failure,
        Some(FailureReason::PolicyAbort {
            check: "thresholds: http_req_duration".to_string()
        })
    );
}

#[tokio::test]
async fn test_thresholds_without_stop_on_failure_only_affect_exit_code() {
    let mut lines = vec![OutputLine::stderr(
        r#"level=error msg="thresholds on metrics 'errors' have been crossed""#,
    )];
    lines.extend(summary_lines());
    let launcher = Arc::new(ScriptedLauncher::new(lines, Ending::Exit(exited(99))));
    let terminations = Arc::clone(&launcher.terminations);

    let h = harness(launcher, Arc::new(InMemoryExecutionStore::new()), false, None);
    let record = h.machine.run().await;

    assert_eq!(terminations.load(Ordering::SeqCst), 0);
    assert_eq!(record.failure, Some(FailureReason::ExitCode { code: 99 }));
    assert_eq!(record.summary.map(|s| s.http_reqs), Some(300));
}

#[tokio::test]
async fn test_external_kill_is_failed_by_signal() {
    let lines = vec![OutputLine::stderr("running (0m01.0s), 10/10 VUs")];
    let launcher = Arc::new(ScriptedLauncher::new(lines, Ending::Exit(signalled(9))));

    let h = harness(launcher, Arc::new(InMemoryExecutionStore::new()), false, None);
    let events = collect(&h.hub, &h.record);
    let record = h.machine.run().await;
    let events = events.await.unwrap();

    assert_eq!(record.failure, Some(FailureReason::KilledBySignal { signal: 9 }));
    assert!(record.summary_unavailable);
    assert!(record.summary.is_none());

    assert!(events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::Info)));
    let error = events
        .iter()
        .find_map(|e| match &e.payload {
            EventPayload::Error { last_status, .. } => Some(last_status.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(error.as_deref(), Some("running (0m01.0s), 10/10 VUs"));
}

#[tokio::test]
async fn test_spawn_failure_never_runs() {
    let mut launcher = ScriptedLauncher::new(Vec::new(), Ending::Exit(exited(0)));
    launcher.fail_spawn = true;

    let persister = Arc::new(InMemoryExecutionStore::new());
    let h = harness(Arc::new(launcher), persister.clone(), false, None);
    persister.save_execution(&h.record).await.unwrap();
    let events = collect(&h.hub, &h.record);
    let record = h.machine.run().await;
    let events = events.await.unwrap();

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.started_at.is_none());
    assert!(matches!(record.failure, Some(FailureReason::Spawn { .. })));
    assert!(!record.summary_unavailable);
    assert!(!events
        .iter()
        .any(|e| e.status_value() == Some(ExecutionStatus::Running)));

    let stored = persister.get_execution(record.id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_stop_request_aborts() {
    let launcher = Arc::new(ScriptedLauncher::new(
        vec![OutputLine::stdout("starting")],
        Ending::HangUntilTerminated(exited(105)),
    ));
    let terminations = Arc::clone(&launcher.terminations);

    let h = harness(launcher, Arc::new(InMemoryExecutionStore::new()), false, None);
    let task = tokio::spawn(h.machine.run());
    h.control
        .send(ControlMessage::Stop {
            by: "user".to_string(),
        })
        .await
        .unwrap();
    let record = task.await.unwrap();

    assert_eq!(terminations.load(Ordering::SeqCst), 1);
    assert_eq!(
        record.failure,
        Some(FailureReason::Aborted {
            by: "user".to_string()
        })
    );
}

#[tokio::test]
async fn test_max_run_duration_times_out() {
    let launcher = Arc::new(ScriptedLauncher::new(
        Vec::new(),
        Ending::HangUntilTerminated(signalled(15)),
    ));

    let h = harness(
        launcher,
        Arc::new(InMemoryExecutionStore::new()),
        false,
        Some(Duration::from_millis(50)),
    );
    let record = h.machine.run().await;

    assert_eq!(record.failure, Some(FailureReason::TimedOut { after_ms: 50 }));
}

#[tokio::test]
async fn test_log_tail_is_capped() {
    let lines: Vec<_> = (0..200)
        .map(|i| OutputLine::stderr(format!("level=info msg=\"line number {i:04}\"")))
        .collect();
    let launcher = Arc::new(ScriptedLauncher::new(lines, Ending::Exit(exited(0))));

    let h = harness(launcher, Arc::new(InMemoryExecutionStore::new()), false, None);
    let record = h.machine.run().await;

    let logs = record.logs.unwrap();
    assert!(logs.len() <= 1024);
    assert!(logs.contains("line number 0199"));
    assert!(!logs.contains("line number 0000"));
}

#[tokio::test]
async fn test_control_channel_closed_before_terminal_write() {
    let launcher = Arc::new(ScriptedLauncher::new(summary_lines(), Ending::Exit(exited(0))));
    let (closed_tx, closed_rx) = std::sync::mpsc::channel();
    let control_slot: Arc<std::sync::Mutex<Option<mpsc::Sender<ControlMessage>>>> =
        Arc::new(std::sync::Mutex::new(None));
    let slot = Arc::clone(&control_slot);

    let mut persister = MockExecutionRepo::new();
    persister
        .expect_update_execution()
        .times(1)
        .returning(move |_, _| {
            let control = slot.lock().unwrap().clone().unwrap();
            closed_tx.send(control.is_closed()).unwrap();
            Ok(())
        });

    let h = harness(launcher, Arc::new(persister), false, None);
    *control_slot.lock().unwrap() = Some(h.control.clone());
    let record = h.machine.run().await;

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(closed_rx.recv().unwrap());
    assert!(h
        .control
        .send(ControlMessage::Stop {
            by: "user".to_string()
        })
        .await
        .is_err());
}
