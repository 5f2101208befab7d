//! End-to-end repair scenarios
//!
//! Drives the coordinator against a temp copy of the demo service with all
//! narrative pauses disabled and a scripted validation command.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use mender::bridge::{ChatPolicy, NotificationBridge, PassAll, Sentinel, SessionItem};
use mender::capability::{
    Capability, CapabilityRegistry, CapabilityResult, LogClassification, RunValidationSuite, Workspace, names,
};
use mender::config::{Config, RepairConfig};
use mender::coordinator::RunCoordinator;
use mender::domain::{EventLevel, FailureKind, Outcome, Phase};
use mender::engine::RepairEngine;
use mender::error::MenderError;
use mender::strategy::StrategyTable;

const BROKEN_MODULE: &str = include_str!("fixtures/app/broken_module.py");
const DATABASE: &str = include_str!("fixtures/app/database.py");

const PASSING: &str = "printf 'tests/test_app.py::test_user PASSED\\ntests/test_app.py::test_stats PASSED\\n'";
const FAILING: &str = "printf 'FAILED tests/test_app.py::test_user - AssertionError: boom\\n'; exit 1";

const FULL_RUN: [Phase; 7] = [
    Phase::Detect,
    Phase::Analyze,
    Phase::Patch,
    Phase::Test,
    Phase::Deploy,
    Phase::Report,
    Phase::Complete,
];

struct Harness {
    temp: TempDir,
    coordinator: Arc<RunCoordinator>,
}

impl Harness {
    fn new(suite: &str) -> Self {
        Self::build(suite, StrategyTable::standard(), None)
    }

    fn build(suite: &str, strategies: StrategyTable, classifier: Option<Arc<dyn Capability>>) -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        std::fs::write(temp.path().join("app/broken_module.py"), BROKEN_MODULE).unwrap();
        std::fs::write(temp.path().join("app/database.py"), DATABASE).unwrap();

        let mut config = Config::default();
        config.repair = RepairConfig::instant();
        let mut registry = CapabilityRegistry::standard(Workspace::new(temp.path()), &config);
        registry.register(Arc::new(RunValidationSuite::new(suite, Duration::from_secs(10))));
        if let Some(classifier) = classifier {
            registry.register(classifier);
        }

        let engine = RepairEngine::new(Arc::new(registry), Arc::new(strategies), config.repair);
        let coordinator = RunCoordinator::new(engine, NotificationBridge::new(4096))
            .with_journal_dir(temp.path().join("runs"));
        Self {
            temp,
            coordinator: Arc::new(coordinator),
        }
    }

    fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.temp.path().join(rel)).unwrap()
    }

    async fn run(&self, kind: FailureKind) {
        self.coordinator.trigger(kind).unwrap();
        self.coordinator.wait().await;
    }
}

/// Classifier that always reports an inconclusive result with fixed errors
struct Inconclusive {
    recent_errors: Vec<String>,
}

#[async_trait]
impl Capability for Inconclusive {
    fn name(&self) -> &'static str {
        names::CLASSIFY_LOG
    }

    fn description(&self) -> &'static str {
        "scripted inconclusive classification"
    }

    async fn invoke(&self, _input: Value, _ws: &Workspace) -> eyre::Result<CapabilityResult> {
        CapabilityResult::ok(&LogClassification {
            error_count: self.recent_errors.len(),
            warning_count: 0,
            recent_errors: self.recent_errors.clone(),
            file_refs: Vec::new(),
            exception_types: Vec::new(),
            failure_kind: FailureKind::Unknown,
            root_cause: "Unknown".to_string(),
        })
    }
}

#[tokio::test]
async fn test_each_kind_runs_all_phases_and_patches_its_resource() {
    for (kind, resource, original) in [
        (FailureKind::NullPointer, "app/broken_module.py", BROKEN_MODULE),
        (FailureKind::SqlError, "app/database.py", DATABASE),
        (FailureKind::InfiniteLoop, "app/broken_module.py", BROKEN_MODULE),
    ] {
        let harness = Harness::new(PASSING);
        harness.run(kind).await;

        let record = harness.coordinator.status();
        assert_eq!(record.phase_history, FULL_RUN.to_vec(), "{}", kind);
        assert_eq!(record.outcome, Some(Outcome::Success));
        assert_eq!(record.incident.failure_kind, Some(kind));
        assert_eq!(record.incident.affected_resource.as_deref(), Some(resource));
        assert_eq!(record.incident.test_attempts, 1);
        assert!(record.incident.tests_passed);
        assert_ne!(harness.read(resource), original, "{} left {} untouched", kind, resource);

        let report = record.report.expect("report written");
        assert!(report.path.exists());
        assert!(report.content.contains(&record.incident.incident_id()));

        let completes = record.log.iter().filter(|e| e.level == EventLevel::Complete).count();
        assert_eq!(completes, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_admit_exactly_one() {
    let harness = Harness::new("sleep 0.5; printf 't::a PASSED\\n'");
    let mut handles = Vec::new();
    for kind in [FailureKind::NullPointer, FailureKind::SqlError, FailureKind::InfiniteLoop]
        .into_iter()
        .cycle()
        .take(8)
    {
        let coordinator = harness.coordinator.clone();
        handles.push(tokio::spawn(async move { coordinator.trigger(kind) }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(MenderError::CoordinatorBusy(_)) => {}
            Err(other) => panic!("unexpected error {}", other),
        }
    }
    assert_eq!(accepted, 1);

    harness.coordinator.wait().await;
    let record = harness.coordinator.status();
    assert_eq!(record.outcome, Some(Outcome::Success));
    assert_eq!(record.phase_history.iter().filter(|p| **p == Phase::Detect).count(), 1);
}

#[tokio::test]
async fn test_failing_suite_is_retried_then_completes_partially() {
    let harness = Harness::new(FAILING);
    harness.run(FailureKind::SqlError).await;

    let record = harness.coordinator.status();
    assert_eq!(record.incident.test_attempts, 3);
    assert!(!record.incident.tests_passed);
    assert_eq!(record.outcome, Some(Outcome::PartialFailure));
    assert_eq!(record.phase_history, FULL_RUN.to_vec());
    // partial failure still reports a repaired service
    assert_eq!(harness.coordinator.poll(0).success, Some(true));

    let runs = record
        .log
        .iter()
        .filter(|e| e.level == EventLevel::Tool && e.message.contains(names::RUN_VALIDATION_SUITE))
        .count();
    assert_eq!(runs, 3);
}

#[tokio::test]
async fn test_missing_strategy_aborts_before_deploy() {
    let mut strategies = StrategyTable::standard();
    strategies.unregister(FailureKind::NullPointer);
    let harness = Harness::build(PASSING, strategies, None);
    harness.run(FailureKind::NullPointer).await;

    let record = harness.coordinator.status();
    assert_eq!(record.phase, Phase::Aborted);
    assert_eq!(record.outcome, Some(Outcome::Aborted));
    assert!(record.abort_reason.as_deref().unwrap().contains("cannot auto-fix"));
    assert!(!record.phase_history.contains(&Phase::Test));
    assert!(!record.phase_history.contains(&Phase::Deploy));
    assert!(!record.phase_history.contains(&Phase::Report));
    assert!(record.report.is_none());
    assert_eq!(harness.read("app/broken_module.py"), BROKEN_MODULE);
    assert_eq!(harness.coordinator.poll(0).success, Some(false));
}

#[tokio::test]
async fn test_inconclusive_classification_uses_heuristic() {
    let classifier: Arc<dyn Capability> = Arc::new(Inconclusive {
        recent_errors: vec!["sqlite3.OperationalError: no such column: usr_email".to_string()],
    });
    let harness = Harness::build(PASSING, StrategyTable::standard(), Some(classifier));
    harness.run(FailureKind::SqlError).await;

    let record = harness.coordinator.status();
    assert_eq!(record.incident.failure_kind, Some(FailureKind::Unknown));
    assert_eq!(record.incident.affected_resource.as_deref(), Some("app/database.py"));
    assert_eq!(record.outcome, Some(Outcome::Success));
}

#[tokio::test]
async fn test_inconclusive_without_heuristic_match_aborts() {
    let classifier: Arc<dyn Capability> = Arc::new(Inconclusive {
        recent_errors: vec!["disk quota exceeded".to_string()],
    });
    let harness = Harness::build(PASSING, StrategyTable::standard(), Some(classifier));
    harness.run(FailureKind::InfiniteLoop).await;

    let record = harness.coordinator.status();
    assert_eq!(record.outcome, Some(Outcome::Aborted));
    assert_eq!(record.phase_history.last(), Some(&Phase::Aborted));
}

#[tokio::test]
async fn test_missing_resource_is_a_failed_patch_not_a_crash() {
    let harness = Harness::new(PASSING);
    std::fs::remove_file(harness.temp.path().join("app/database.py")).unwrap();
    harness.run(FailureKind::SqlError).await;

    let record = harness.coordinator.status();
    assert_eq!(record.outcome, Some(Outcome::Aborted));
    assert!(record.abort_reason.as_deref().unwrap().starts_with("Patch failed"));
    let failed_reads = record
        .log
        .iter()
        .filter(|e| e.level == EventLevel::ToolResult && e.message.trim_start().starts_with('✗'))
        .count();
    assert!(failed_reads >= 1);
}

#[tokio::test]
async fn test_poll_pages_concatenate_to_full_log() {
    let harness = Harness::new("sleep 0.2; printf 't::a PASSED\\n'");
    harness.coordinator.trigger(FailureKind::NullPointer).unwrap();

    let mut cursor = 0;
    let mut seen = Vec::new();
    loop {
        let page = harness.coordinator.poll(cursor);
        assert_eq!(page.events.len(), page.total - cursor);
        seen.extend(page.events);
        cursor = page.total;
        if page.completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    harness.coordinator.wait().await;

    let record = harness.coordinator.status();
    assert_eq!(seen, record.log);
    let stamps: Vec<_> = seen.iter().map(|e| e.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_live_sessions_filter_independently() {
    let harness = Harness::new(PASSING);
    let everything = harness.coordinator.attach(Box::new(PassAll), Duration::from_secs(10));
    let chat = harness.coordinator.attach(Box::new(ChatPolicy::new()), Duration::from_secs(10));
    harness.run(FailureKind::InfiniteLoop).await;

    let all = everything.collect().await;
    let filtered = chat.collect().await;
    let sentinel = SessionItem::Finished(Sentinel::Succeeded { tests_passed: true });
    assert_eq!(all.last(), Some(&sentinel));
    assert_eq!(filtered.last(), Some(&sentinel));

    let record = harness.coordinator.status();
    assert_eq!(all.len(), record.log.len() + 1);
    assert!(filtered.len() < all.len());

    let messages: Vec<&String> = filtered
        .iter()
        .filter_map(|item| match item {
            SessionItem::Message(text) => Some(text),
            _ => None,
        })
        .collect();
    assert!(messages.iter().all(|m| !m.starts_with("TOOL")));
    assert!(messages.windows(2).all(|w| w[0] != w[1]));
    assert!(messages.iter().any(|m| m.contains("REPAIR COMPLETE")));
}

#[tokio::test]
async fn test_cancel_then_reset() {
    let harness = Harness::new("sleep 5");
    harness.coordinator.trigger(FailureKind::NullPointer).unwrap();

    for _ in 0..300 {
        if harness.coordinator.status().phase == Phase::Test {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(harness.coordinator.reset().await, Err(MenderError::CoordinatorBusy(_))));

    harness.coordinator.cancel().unwrap();
    harness.coordinator.wait().await;
    let record = harness.coordinator.status();
    assert_eq!(record.outcome, Some(Outcome::Aborted));
    assert_eq!(record.abort_reason.as_deref(), Some("cancelled"));
    assert!(!record.phase_history.contains(&Phase::Deploy));

    let log_path = harness.temp.path().join("logs/app.log");
    assert!(!std::fs::read_to_string(&log_path).unwrap().is_empty());
    harness.coordinator.reset().await.unwrap();
    assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "");
    assert_eq!(harness.coordinator.status().phase, Phase::Idle);

    // the next run starts from a clean record
    harness.run(FailureKind::SqlError).await;
    assert_eq!(harness.coordinator.status().outcome, Some(Outcome::Success));
}
