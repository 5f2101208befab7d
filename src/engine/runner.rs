//! Repair engine - drives one run through the six phases
//!
//! Detect → Analyze → Patch → Test (bounded retries) → Deploy → Report.
//! A missing or failed patch aborts; an exhausted test budget still deploys
//! and reports, but the outcome is a partial failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::trace::{Trace, tool_line, tool_result_line, truncate_chars};
use crate::capability::{
    CapabilityRegistry, CapabilityResult, LogClassification, RenderedReport, ValidationReport, names,
};
use crate::config::RepairConfig;
use crate::domain::{EventLevel, FailureKind, Outcome, Phase, ReportDocument, reasoning_transcript};
use crate::error::MenderError;
use crate::id::{clock, format_elapsed};
use crate::service_log;
use crate::strategy::{FixResult, PatchContext, StrategyTable};

const DIVIDER_WIDTH: usize = 54;

/// How a run ended, as reported to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEnd {
    pub outcome: Outcome,
    pub reason: Option<String>,
}

impl RunEnd {
    fn completed(tests_passed: bool) -> Self {
        Self {
            outcome: if tests_passed {
                Outcome::Success
            } else {
                Outcome::PartialFailure
            },
            reason: None,
        }
    }

    fn aborted(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Aborted,
            reason: Some(reason.into()),
        }
    }
}

/// Why a phase stopped the run early
#[derive(Debug)]
enum Halt {
    Cancelled,
    Abort(String),
    Fault(MenderError),
}

type Step<T> = std::result::Result<T, Halt>;

/// Map one validation output line to a trace event, if it is worth showing
pub fn test_line_event(line: &str) -> Option<(EventLevel, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let short = |marker: &str| -> String {
        let tail = line.rsplit("::").next().unwrap_or(line).replace(marker, "");
        tail.split_whitespace().next().unwrap_or_default().to_string()
    };

    if line.starts_with("FAILED ") && line.contains(" - ") {
        Some((EventLevel::Error, format!("   ✗  {}", truncate_chars(line, 100))))
    } else if line.contains("PASSED") {
        Some((EventLevel::Success, format!("   ✓  {}", short(" PASSED"))))
    } else if line.contains("FAILED") {
        Some((EventLevel::Error, format!("   ✗  {}", short(" FAILED"))))
    } else if line.contains("ERROR") && !line.contains("==") {
        Some((EventLevel::Warning, format!("   ⚠  {}", truncate_chars(line, 80))))
    } else {
        None
    }
}

/// Executes repair runs against a capability registry
pub struct RepairEngine {
    registry: Arc<CapabilityRegistry>,
    strategies: Arc<StrategyTable>,
    config: RepairConfig,
}

impl RepairEngine {
    pub fn new(registry: Arc<CapabilityRegistry>, strategies: Arc<StrategyTable>, config: RepairConfig) -> Self {
        Self {
            registry,
            strategies,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Run all phases; `Err` only for engine faults (never for repair failures)
    pub async fn run(&self, trace: &Trace, cancel: &CancellationToken) -> crate::error::Result<RunEnd> {
        let injected = trace
            .read(|r| r.incident.injected)
            .unwrap_or(FailureKind::Unknown);
        log::info!("Repair run starting for injected {}", injected);

        match self.phases(trace, cancel, injected).await {
            Ok(tests_passed) => Ok(RunEnd::completed(tests_passed)),
            Err(Halt::Abort(reason)) => {
                log::warn!("Repair run aborted: {}", reason);
                Ok(RunEnd::aborted(reason))
            }
            Err(Halt::Cancelled) => {
                trace.warning("   Repair cancelled");
                log::warn!("Repair run cancelled");
                Ok(RunEnd::aborted("cancelled"))
            }
            Err(Halt::Fault(e)) => Err(e),
        }
    }

    async fn phases(&self, trace: &Trace, cancel: &CancellationToken, injected: FailureKind) -> Step<bool> {
        trace.emit(EventLevel::Divider, "━".repeat(DIVIDER_WIDTH));
        trace.emit(EventLevel::Banner, "  MENDER  ·  AUTONOMOUS REPAIR CYCLE");
        trace.emit(EventLevel::Divider, "━".repeat(DIVIDER_WIDTH));
        self.pause(self.config.step_pause(), cancel).await?;

        self.detect(trace, cancel).await?;
        let classification = self.analyze(trace, cancel, injected).await?;
        self.patch(trace, cancel, &classification).await?;
        let tests_passed = self.test(trace, cancel).await?;
        self.deploy(trace, cancel).await?;
        self.report(trace, cancel, tests_passed).await?;

        trace.update(|r| r.advance(Phase::Complete)).map_err(Halt::Fault)?;
        Ok(tests_passed)
    }

    async fn detect(&self, trace: &Trace, cancel: &CancellationToken) -> Step<()> {
        self.enter(trace, cancel, Phase::Detect).await?;
        trace.info("   Polling /health endpoint …");
        self.pause(self.config.step_pause(), cancel).await?;
        trace.error("   ✗  HTTP 500 received, service is DOWN");
        trace.info("   Triggering autonomous repair sequence");
        trace.update(|r| r.incident.detected_at = Some(clock(Local::now())));
        Ok(())
    }

    async fn analyze(
        &self,
        trace: &Trace,
        cancel: &CancellationToken,
        injected: FailureKind,
    ) -> Step<Option<LogClassification>> {
        self.enter(trace, cancel, Phase::Analyze).await?;
        trace.info("   Ingesting log file …");

        let mut result = self.call(trace, cancel, names::CLASSIFY_LOG, json!({})).await?;
        if !result.success {
            trace.warning("   Log file missing, writing stub");
            if let Err(e) = service_log::append_stub_log(self.registry.workspace(), injected).await {
                log::warn!("Failed to write stub log: {}", e);
            }
            result = self.call(trace, cancel, names::CLASSIFY_LOG, json!({})).await?;
        }

        let classification: Option<LogClassification> = if result.success { result.decode() } else { None };
        let (kind, root_cause, error_count) = match &classification {
            Some(c) => (c.failure_kind, c.root_cause.clone(), c.error_count),
            None => (FailureKind::Unknown, "Unknown".to_string(), 0),
        };

        trace.update(|r| {
            r.incident.analysis_at = Some(clock(Local::now()));
            r.incident.failure_kind = Some(kind);
            r.incident.root_cause = Some(root_cause.clone());
            r.incident.error_count = error_count;
        });

        trace.success(format!("   Root cause → {}", root_cause));
        if let Some(first) = classification.as_ref().and_then(|c| c.file_refs.first()) {
            trace.info(format!("   Affected: {} line {}", first.file, first.line));
        }
        trace.info(format!("   Error count in logs: {}", error_count));
        Ok(classification)
    }

    async fn patch(
        &self,
        trace: &Trace,
        cancel: &CancellationToken,
        classification: &Option<LogClassification>,
    ) -> Step<()> {
        self.enter(trace, cancel, Phase::Patch).await?;

        let (kind, recent_errors) = match classification {
            Some(c) => (c.failure_kind, c.recent_errors.clone()),
            None => (FailureKind::Unknown, Vec::new()),
        };

        let Some(strategy) = self.strategies.lookup(kind, &recent_errors) else {
            let reason = "Unknown failure, cannot auto-fix";
            trace.error(format!("   ✗  Patch failed: {}", reason));
            return Err(Halt::Abort(format!("Patch failed: {}", reason)));
        };
        if strategy.kind() != kind {
            trace.info(format!(
                "   Classification inconclusive, heuristic selected {}",
                strategy.kind()
            ));
        }

        let ctx = TracedResources {
            engine: self,
            trace,
            cancel,
        };
        let fix = strategy.attempt(&ctx).await;
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }

        match fix {
            FixResult::Applied {
                affected_resource,
                description,
                diff,
            } => {
                trace.update(|r| {
                    r.incident.fix_at = Some(clock(Local::now()));
                    r.incident.fix_description = Some(description);
                    r.incident.diff = Some(diff);
                    r.incident.affected_resource = Some(affected_resource);
                });
                Ok(())
            }
            FixResult::Failed { reason } => {
                trace.error(format!("   ✗  Patch failed: {}", reason));
                Err(Halt::Abort(format!("Patch failed: {}", reason)))
            }
        }
    }

    async fn test(&self, trace: &Trace, cancel: &CancellationToken) -> Step<bool> {
        self.enter(trace, cancel, Phase::Test).await?;
        let max = self.config.max_test_attempts;
        let mut passed = false;

        for attempt in 1..=max {
            trace.info(format!("   Running validation suite … (attempt {}/{})", attempt, max));
            self.pause(self.config.step_pause(), cancel).await?;

            let result = self.call(trace, cancel, names::RUN_VALIDATION_SUITE, json!({})).await?;
            trace.update(|r| r.incident.test_attempts = attempt);

            let report: ValidationReport = result
                .decode()
                .unwrap_or_else(|| ValidationReport::errored(result.error.clone().unwrap_or_default()));
            for line in report.raw_output.lines() {
                if let Some((level, message)) = test_line_event(line) {
                    trace.emit(level, message);
                }
            }

            if result.success {
                trace.success(format!(
                    "   ✓  All {} tests passed, no regressions detected",
                    report.passed
                ));
                passed = true;
                break;
            }

            trace.warning(format!(
                "   ✗  {} test(s) failed, {} passed",
                report.failed, report.passed
            ));
            if attempt < max {
                trace.info("   Re-running validation against the applied patch …");
                self.pause(self.config.attempt_pause(), cancel).await?;
            }
        }

        trace.update(|r| {
            r.incident.test_at = Some(clock(Local::now()));
            r.incident.tests_passed = passed;
        });
        Ok(passed)
    }

    async fn deploy(&self, trace: &Trace, cancel: &CancellationToken) -> Step<()> {
        self.enter(trace, cancel, Phase::Deploy).await?;
        trace.info("   Rebuilding service image …");
        self.pause(self.config.step_pause(), cancel).await?;
        trace.info("   Service image build: COMPLETE");
        trace.info("   Restarting service …");

        let restart = self.call(trace, cancel, names::RESTART_SERVICE, json!({})).await?;
        if !restart.success {
            trace.warning(format!(
                "   Restart reported failure: {}",
                restart.error.unwrap_or_default()
            ));
        }

        trace.info("   Verifying /health endpoint …");
        self.pause(self.config.step_pause(), cancel).await?;
        trace.success("   ✓  Service is ONLINE, HTTP 200");

        let now = Local::now();
        trace.update(|r| {
            r.incident.recovered_at = Some(clock(now));
            let started = r.incident.started_at.unwrap_or(now);
            r.incident.duration = Some(format_elapsed(now - started));
        });
        Ok(())
    }

    async fn report(&self, trace: &Trace, cancel: &CancellationToken, tests_passed: bool) -> Step<()> {
        self.enter(trace, cancel, Phase::Report).await?;
        trace.info("   Compiling incident timeline …");
        self.pause(self.config.step_pause(), cancel).await?;
        trace.info("   Documenting root cause and fix applied …");

        let incident = trace.update(|r| {
            r.incident.reasoning_log = Some(reasoning_transcript(&r.log));
            r.incident.clone()
        });

        let rendered = self
            .call(trace, cancel, names::RENDER_REPORT, json!({ "incident": incident }))
            .await?;
        match rendered.decode::<RenderedReport>() {
            Some(doc) if rendered.success => {
                trace.success(format!("   ✓  Report saved → {}", doc.path));
                trace.update(|r| {
                    r.report = Some(ReportDocument {
                        path: doc.path.into(),
                        content: doc.content,
                    })
                });
            }
            _ => {
                trace.warning(format!(
                    "   Report rendering failed: {}",
                    rendered.error.unwrap_or_default()
                ));
            }
        }

        let duration = incident.duration.unwrap_or_default();
        trace.emit(EventLevel::Divider, "━".repeat(DIVIDER_WIDTH));
        trace.emit(
            EventLevel::Complete,
            format!(
                "  REPAIR COMPLETE  ·  {}  ·  Tests: {}  ·  Service: HEALTHY",
                duration,
                if tests_passed { "PASS" } else { "PARTIAL" }
            ),
        );
        trace.emit(EventLevel::Divider, "━".repeat(DIVIDER_WIDTH));
        Ok(())
    }

    /// Advance the record and announce the phase
    async fn enter(&self, trace: &Trace, cancel: &CancellationToken, phase: Phase) -> Step<()> {
        trace.update(|r| r.advance(phase)).map_err(Halt::Fault)?;
        trace.emit(
            EventLevel::Phase,
            format!("▶  PHASE {} · {}", phase.number().unwrap_or(0), phase.title()),
        );
        self.pause(self.config.phase_pause(), cancel).await
    }

    /// Narrative pause that yields to cancellation
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Step<()> {
        if duration.is_zero() {
            return if cancel.is_cancelled() {
                Err(Halt::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(Halt::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Invoke a capability with tool/tool_result trace lines
    async fn call(&self, trace: &Trace, cancel: &CancellationToken, name: &str, input: Value) -> Step<CapabilityResult> {
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        trace.emit(EventLevel::Tool, tool_line(name, &input));

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(Halt::Cancelled),
            result = self.registry.invoke(name, input) => result,
        };

        trace.emit(EventLevel::ToolResult, tool_result_line(&result));
        Ok(result)
    }
}

/// Strategy resource access routed through traced capability calls
struct TracedResources<'a> {
    engine: &'a RepairEngine,
    trace: &'a Trace,
    cancel: &'a CancellationToken,
}

#[async_trait]
impl PatchContext for TracedResources<'_> {
    async fn read(&self, resource: &str) -> Result<String, String> {
        let result = self
            .engine
            .call(self.trace, self.cancel, names::READ_RESOURCE, json!({ "path": resource }))
            .await
            .map_err(|_| "cancelled".to_string())?;
        if !result.success {
            return Err(result.error.unwrap_or_else(|| format!("Failed to read {}", resource)));
        }
        result
            .field("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("No content returned for {}", resource))
    }

    async fn write(&self, resource: &str, content: &str) -> Result<(), String> {
        let result = self
            .engine
            .call(
                self.trace,
                self.cancel,
                names::WRITE_RESOURCE,
                json!({ "path": resource, "content": content }),
            )
            .await
            .map_err(|_| "cancelled".to_string())?;
        if result.success {
            Ok(())
        } else {
            Err(result.error.unwrap_or_else(|| format!("Failed to write {}", resource)))
        }
    }

    fn note(&self, message: &str) {
        self.trace.info(format!("   {}", message));
    }
}
