//! Run coordinator implementation
//!
//! Owns the single RunRecord, admits at most one run at a time, spawns the
//! engine on a supervised task and publishes the terminal sentinel.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{ForwardPolicy, LiveSession, NotificationBridge, Sentinel};
use crate::capability::{CapabilityRegistry, Workspace, latest_report};
use crate::config::Config;
use crate::domain::{FailureKind, Outcome, PollPage, ReportDocument, RunRecord};
use crate::engine::{RepairEngine, RunEnd, RunJournal, Trace};
use crate::error::{MenderError, Result};
use crate::id::generate_run_id;
use crate::service_log;
use crate::strategy::StrategyTable;

/// Single-flight owner of the repair run
pub struct RunCoordinator {
    record: Arc<RwLock<RunRecord>>,
    engine: Arc<RepairEngine>,
    bridge: NotificationBridge,
    journal_dir: Option<PathBuf>,
    cancel: Mutex<CancellationToken>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RunCoordinator {
    pub fn new(engine: RepairEngine, bridge: NotificationBridge) -> Self {
        Self {
            record: Arc::new(RwLock::new(RunRecord::idle())),
            engine: Arc::new(engine),
            bridge,
            journal_dir: None,
            cancel: Mutex::new(CancellationToken::new()),
            worker: Mutex::new(None),
        }
    }

    /// Standard capabilities and strategies, wired from configuration
    pub fn from_config(config: &Config) -> Self {
        let workspace = Workspace::from_config(&config.workspace);
        let registry = Arc::new(CapabilityRegistry::standard(workspace, config));
        let engine = RepairEngine::new(registry, Arc::new(StrategyTable::standard()), config.repair.clone());
        Self::new(engine, NotificationBridge::new(config.ipc.event_channel_capacity))
            .with_journal_dir(config.workspace.data_dir.join("runs"))
    }

    /// Journal each run's events under `dir`
    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    pub fn workspace(&self) -> &Workspace {
        self.engine.registry().workspace()
    }

    pub fn bridge(&self) -> &NotificationBridge {
        &self.bridge
    }

    /// Start a run for an injected failure; refused while one is in flight
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self, kind: FailureKind) -> Result<String> {
        if kind == FailureKind::Unknown {
            return Err(MenderError::UnknownFailureKind(kind.to_string()));
        }

        let run_id = generate_run_id();
        {
            let mut record = self.write();
            if record.running {
                return Err(MenderError::CoordinatorBusy(format!(
                    "repair {} is already running",
                    record.run_id.as_deref().unwrap_or("?")
                )));
            }
            record.begin(&run_id, kind);
        }

        let cancel = CancellationToken::new();
        *lock(&self.cancel) = cancel.clone();

        let mut trace = Trace::new(self.record.clone(), self.bridge.clone());
        if let Some(dir) = &self.journal_dir {
            trace = trace.with_journal(RunJournal::open(dir, &run_id));
        }

        log::info!("Triggered {} for {}", run_id, kind);
        let handle = tokio::spawn(supervise(self.engine.clone(), trace, cancel, kind));
        *lock(&self.worker) = Some(handle);
        Ok(run_id)
    }

    /// Snapshot of the whole record
    pub fn status(&self) -> RunRecord {
        self.read().clone()
    }

    /// Events from `since` onward plus status flags
    pub fn poll(&self, since: usize) -> PollPage {
        self.read().page(since)
    }

    pub fn is_running(&self) -> bool {
        self.read().running
    }

    /// Return to idle and empty the incident log; refused while running
    pub async fn reset(&self) -> Result<()> {
        {
            let mut record = self.write();
            if record.running {
                return Err(MenderError::CoordinatorBusy(
                    "cannot reset while a repair is running".to_string(),
                ));
            }
            *record = RunRecord::idle();
        }
        service_log::truncate(self.workspace()).await?;
        log::info!("Run record reset");
        Ok(())
    }

    /// Ask the in-flight run to stop at its next checkpoint
    pub fn cancel(&self) -> Result<()> {
        if !self.is_running() {
            return Err(MenderError::InvalidState("no repair is running".to_string()));
        }
        lock(&self.cancel).cancel();
        log::info!("Cancellation requested");
        Ok(())
    }

    /// Attach a live consumer to the bridge
    pub fn attach(&self, policy: Box<dyn ForwardPolicy>, idle_timeout: Duration) -> LiveSession {
        self.bridge.attach(policy, idle_timeout)
    }

    /// Wait for the current worker (if any) to finish
    pub async fn wait(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            log::error!("Supervisor task failed: {}", e);
        }
    }

    /// The last run's report, or the newest one on disk
    pub async fn latest_report(&self) -> Option<ReportDocument> {
        let cached = self.read().report.clone();
        if cached.is_some() {
            return cached;
        }
        let path = latest_report(&self.workspace().reports_path())?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(ReportDocument { path, content }),
            Err(e) => {
                log::warn!("Failed to read report {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RunRecord> {
        self.record.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RunRecord> {
        self.record.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sentinel for a run that ended on its own terms
fn sentinel_for(end: &RunEnd) -> Sentinel {
    match end.outcome {
        Outcome::Success => Sentinel::Succeeded { tests_passed: true },
        Outcome::PartialFailure => Sentinel::Succeeded { tests_passed: false },
        Outcome::Aborted => Sentinel::Failed {
            reason: end.reason.clone().unwrap_or_else(|| "aborted".to_string()),
        },
    }
}

/// Run the engine on its own task and finalize the record whatever happens
async fn supervise(engine: Arc<RepairEngine>, trace: Trace, cancel: CancellationToken, kind: FailureKind) {
    let worker_trace = trace.clone();
    let worker = tokio::spawn(async move {
        if let Err(e) = service_log::write_failure_log(engine.registry().workspace(), kind).await {
            log::warn!("Failed to inject {} failure log: {}", kind, e);
        }
        engine.run(&worker_trace, &cancel).await
    });

    let (end, sentinel) = match worker.await {
        Ok(Ok(end)) => {
            let sentinel = sentinel_for(&end);
            (end, sentinel)
        }
        Ok(Err(e)) => fatal(&trace, e.to_string()),
        Err(e) => fatal(&trace, e.to_string()),
    };

    trace.flush_journal().await;
    let run_id = trace.update(|r| {
        r.finish(end.outcome, end.reason.clone());
        r.run_id.clone().unwrap_or_default()
    });
    log::info!("Run {} finished: {:?}", run_id, end.outcome);
    trace.bridge().finish(&run_id, sentinel);
}

fn fatal(trace: &Trace, detail: String) -> (RunEnd, Sentinel) {
    log::error!("Repair worker failed: {}", detail);
    trace.error(format!("FATAL: {}", detail));
    (
        RunEnd {
            outcome: Outcome::Aborted,
            reason: Some(detail.clone()),
        },
        Sentinel::Error { detail },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{PassAll, SessionItem};
    use crate::capability::{Capability, CapabilityResult, names};
    use crate::coordinator::testing::{PASSING, fixture_coordinator as coordinator, fixture_coordinator_with};
    use crate::domain::{EventLevel, Phase};
    use async_trait::async_trait;
    use serde_json::Value;

    /// Restart that takes the worker down with it
    struct CrashingRestart;

    #[async_trait]
    impl Capability for CrashingRestart {
        fn name(&self) -> &'static str {
            names::RESTART_SERVICE
        }

        fn description(&self) -> &'static str {
            "panics"
        }

        async fn invoke(&self, _input: Value, _ws: &Workspace) -> eyre::Result<CapabilityResult> {
            panic!("restart exploded");
        }
    }

    #[tokio::test]
    async fn test_trigger_runs_to_success() {
        let (temp, coordinator) = coordinator(PASSING);
        let run_id = coordinator.trigger(FailureKind::SqlError).unwrap();
        coordinator.wait().await;

        let record = coordinator.status();
        assert_eq!(record.run_id.as_deref(), Some(run_id.as_str()));
        assert_eq!(record.phase, Phase::Complete);
        assert_eq!(record.outcome, Some(Outcome::Success));
        assert!(!record.running);
        assert!(record.completed);
        assert_eq!(record.incident.failure_kind, Some(FailureKind::SqlError));
        assert!(record.report.is_some());

        let journal = RunJournal::path_for(temp.path().join("runs"), &run_id);
        assert_eq!(RunJournal::read_events(journal).await.unwrap().len(), record.log.len());
    }

    #[tokio::test]
    async fn test_second_trigger_is_refused_while_running() {
        let (_temp, coordinator) = coordinator("sleep 0.3; printf 't::a PASSED\\n'");
        coordinator.trigger(FailureKind::NullPointer).unwrap();
        let second = coordinator.trigger(FailureKind::InfiniteLoop);
        assert!(matches!(second, Err(MenderError::CoordinatorBusy(_))));
        assert!(matches!(coordinator.reset().await, Err(MenderError::CoordinatorBusy(_))));

        coordinator.wait().await;
        assert_eq!(coordinator.status().incident.injected, Some(FailureKind::NullPointer));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_not_triggerable() {
        let (_temp, coordinator) = coordinator(PASSING);
        assert!(matches!(
            coordinator.trigger(FailureKind::Unknown),
            Err(MenderError::UnknownFailureKind(_))
        ));
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_sentinel_follows_running_false() {
        let (_temp, coordinator) = coordinator(PASSING);
        let mut session = coordinator.attach(Box::new(PassAll), Duration::from_secs(10));
        coordinator.trigger(FailureKind::InfiniteLoop).unwrap();

        loop {
            match session.next().await {
                Some(SessionItem::Finished(sentinel)) => {
                    assert_eq!(sentinel, Sentinel::Succeeded { tests_passed: true });
                    assert!(!coordinator.is_running());
                    break;
                }
                Some(SessionItem::Message(_)) => continue,
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_run() {
        let (_temp, coordinator) = coordinator("sleep 5");
        coordinator.trigger(FailureKind::SqlError).unwrap();

        for _ in 0..200 {
            if coordinator.status().phase == Phase::Test {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        coordinator.cancel().unwrap();
        coordinator.wait().await;

        let record = coordinator.status();
        assert_eq!(record.outcome, Some(Outcome::Aborted));
        assert_eq!(record.abort_reason.as_deref(), Some("cancelled"));
        assert_eq!(record.phase, Phase::Aborted);
        assert!(coordinator.cancel().is_err());
    }

    #[tokio::test]
    async fn test_reset_truncates_log_and_clears_record() {
        let (_temp, coordinator) = coordinator(PASSING);
        coordinator.trigger(FailureKind::NullPointer).unwrap();
        coordinator.wait().await;
        assert!(coordinator.latest_report().await.is_some());

        coordinator.reset().await.unwrap();
        let record = coordinator.status();
        assert_eq!(record.phase, Phase::Idle);
        assert!(record.log.is_empty());
        assert_eq!(std::fs::read_to_string(coordinator.workspace().log_file()).unwrap(), "");
        // report files stay on disk
        assert!(coordinator.latest_report().await.is_some());
    }

    #[tokio::test]
    async fn test_poll_pages_by_offset() {
        let (_temp, coordinator) = coordinator(PASSING);
        coordinator.trigger(FailureKind::SqlError).unwrap();
        coordinator.wait().await;

        let all = coordinator.poll(0);
        let tail = coordinator.poll(5);
        assert_eq!(tail.total, all.total);
        assert_eq!(tail.events, all.events[5..].to_vec());
        assert!(coordinator.poll(all.total + 10).events.is_empty());
        assert_eq!(all.success, Some(true));
    }

    #[tokio::test]
    async fn test_worker_panic_is_recorded_as_fatal_abort() {
        let crashing: Arc<dyn Capability> = Arc::new(CrashingRestart);
        let (_temp, coordinator) = fixture_coordinator_with(PASSING, vec![crashing]);
        let session = coordinator.attach(Box::new(PassAll), Duration::from_secs(10));
        coordinator.trigger(FailureKind::NullPointer).unwrap();
        let items = session.collect().await;

        let record = coordinator.status();
        assert!(!record.running);
        assert_eq!(record.outcome, Some(Outcome::Aborted));
        assert_eq!(record.phase, Phase::Aborted);
        let fatal = record
            .log
            .iter()
            .find(|e| e.level == EventLevel::Error && e.message.starts_with("FATAL:"))
            .expect("fatal event in log");
        assert!(fatal.message.contains("restart exploded"));

        match items.last() {
            Some(SessionItem::Finished(Sentinel::Error { detail })) => assert!(detail.contains("restart exploded")),
            other => panic!("unexpected {:?}", other),
        }

        // the coordinator is free again
        coordinator.wait().await;
        assert!(coordinator.trigger(FailureKind::SqlError).is_ok());
        coordinator.wait().await;
    }

    #[tokio::test]
    async fn test_followed_session_ignores_previous_runs_sentinel() {
        let (_temp, coordinator) = coordinator(PASSING);
        let mut session = coordinator.attach(Box::new(PassAll), Duration::from_secs(10));
        // a sentinel from an earlier run still in flight when this session attached
        coordinator
            .bridge()
            .finish("run-earlier", Sentinel::Failed { reason: "cancelled".into() });

        let run_id = coordinator.trigger(FailureKind::SqlError).unwrap();
        session.follow_run(run_id);

        let items = session.collect().await;
        let finished: Vec<_> = items
            .iter()
            .filter(|item| matches!(item, SessionItem::Finished(_)))
            .collect();
        assert_eq!(finished, vec![&SessionItem::Finished(Sentinel::Succeeded { tests_passed: true })]);
        assert!(items.len() > 1);
    }
}
