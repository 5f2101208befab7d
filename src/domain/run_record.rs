//! The canonical run record
//!
//! One `RunRecord` exists per coordinator. It is created at trigger time,
//! mutated only by the engine while `running` is true, and frozen once
//! `completed` is set. Readers take snapshots or offset pages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::event::Event;
use super::failure::FailureKind;
use super::incident::Incident;
use super::outcome::Outcome;
use super::phase::Phase;
use crate::error::{MenderError, Result};

/// A rendered postmortem document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDocument {
    pub path: PathBuf,
    pub content: String,
}

/// State of the current (or last) repair run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Opaque run identifier (None before the first trigger)
    pub run_id: Option<String>,
    pub phase: Phase,
    pub running: bool,
    pub completed: bool,
    pub outcome: Option<Outcome>,
    /// Human-readable reason when the run aborted
    pub abort_reason: Option<String>,
    /// Phases entered, in order
    pub phase_history: Vec<Phase>,
    pub log: Vec<Event>,
    pub incident: Incident,
    pub report: Option<ReportDocument>,
}

impl Default for RunRecord {
    fn default() -> Self {
        Self::idle()
    }
}

impl RunRecord {
    /// Record with no run
    pub fn idle() -> Self {
        Self {
            run_id: None,
            phase: Phase::Idle,
            running: false,
            completed: false,
            outcome: None,
            abort_reason: None,
            phase_history: Vec::new(),
            log: Vec::new(),
            incident: Incident::default(),
            report: None,
        }
    }

    /// Reset for a new run and mark it running
    pub fn begin(&mut self, run_id: &str, injected: FailureKind) {
        *self = Self {
            run_id: Some(run_id.to_string()),
            running: true,
            incident: Incident::begin(injected),
            ..Self::idle()
        };
    }

    /// Append an event to the trace. Frozen records drop the event.
    pub fn append(&mut self, event: Event) {
        if self.completed {
            log::warn!("Dropping event appended to completed run: {}", event.message);
            return;
        }
        self.log.push(event);
    }

    /// Move to the next phase, refusing regressions and skips
    pub fn advance(&mut self, to: Phase) -> Result<()> {
        if self.completed {
            return Err(MenderError::InvalidState(format!(
                "run already completed, cannot enter {}",
                to
            )));
        }
        if !self.phase.can_advance_to(to) {
            return Err(MenderError::InvalidState(format!(
                "cannot move from {} to {}",
                self.phase, to
            )));
        }
        self.phase = to;
        self.phase_history.push(to);
        Ok(())
    }

    /// Freeze the record with its terminal outcome
    pub fn finish(&mut self, outcome: Outcome, abort_reason: Option<String>) {
        if outcome == Outcome::Aborted && !self.phase.is_terminal() {
            if self.phase.is_active() {
                self.phase_history.push(Phase::Aborted);
            }
            self.phase = Phase::Aborted;
        }
        self.outcome = Some(outcome);
        self.abort_reason = abort_reason;
        self.running = false;
        self.completed = true;
    }

    /// Success flag as reported to pollers: None until the run completes
    pub fn success(&self) -> Option<bool> {
        self.outcome.map(|o| o.is_repaired())
    }

    /// Events from `since` onward plus current status flags
    pub fn page(&self, since: usize) -> PollPage {
        let events = self.log.get(since..).map(|s| s.to_vec()).unwrap_or_default();
        PollPage {
            events,
            total: self.log.len(),
            phase: self.phase,
            running: self.running,
            completed: self.completed,
            success: self.success(),
            outcome: self.outcome,
        }
    }
}

/// Offset-cursor view of the durable event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPage {
    pub events: Vec<Event>,
    /// Total events in the log; the next cursor
    pub total: usize,
    pub phase: Phase,
    pub running: bool,
    pub completed: bool,
    pub success: Option<bool>,
    pub outcome: Option<Outcome>,
}
