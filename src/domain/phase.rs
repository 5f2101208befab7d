//! Repair phases and their forward-only ordering.

use serde::{Deserialize, Serialize};

/// Lifecycle position of a repair run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No run has started (or the record was reset)
    Idle,
    Detect,
    Analyze,
    Patch,
    Test,
    Deploy,
    Report,
    /// Terminal: the run finished all six phases
    Complete,
    /// Terminal: the run stopped early
    Aborted,
}

impl Phase {
    /// The six working phases, in execution order
    pub const SEQUENCE: [Phase; 6] = [
        Phase::Detect,
        Phase::Analyze,
        Phase::Patch,
        Phase::Test,
        Phase::Deploy,
        Phase::Report,
    ];

    /// Returns true if the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Aborted)
    }

    /// Returns true for the six working phases
    pub fn is_active(&self) -> bool {
        Self::SEQUENCE.contains(self)
    }

    /// The phase that follows this one on the success path
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Detect),
            Phase::Detect => Some(Phase::Analyze),
            Phase::Analyze => Some(Phase::Patch),
            Phase::Patch => Some(Phase::Test),
            Phase::Test => Some(Phase::Deploy),
            Phase::Deploy => Some(Phase::Report),
            Phase::Report => Some(Phase::Complete),
            Phase::Complete | Phase::Aborted => None,
        }
    }

    /// Forward-only: the immediate successor, or Aborted from a working phase
    pub fn can_advance_to(&self, to: Phase) -> bool {
        if to == Phase::Aborted {
            return self.is_active();
        }
        self.next() == Some(to)
    }

    /// 1-based position among the working phases
    pub fn number(&self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|p| p == self).map(|i| i + 1)
    }

    /// Headline used in the phase banner of the trace
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Detect => "FAILURE DETECTION",
            Phase::Analyze => "LOG ANALYSIS",
            Phase::Patch => "CODE PATCH",
            Phase::Test => "TEST VALIDATION",
            Phase::Deploy => "SERVICE RECOVERY & DEPLOYMENT",
            Phase::Report => "POSTMORTEM GENERATION",
            Phase::Complete => "COMPLETE",
            Phase::Aborted => "ABORTED",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Detect => "detect",
            Phase::Analyze => "analyze",
            Phase::Patch => "patch",
            Phase::Test => "test",
            Phase::Deploy => "deploy",
            Phase::Report => "report",
            Phase::Complete => "complete",
            Phase::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
