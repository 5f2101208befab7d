//! Domain types for Mender
//!
//! This module contains all core domain types:
//! - Event / EventLevel: one leveled line of a run's trace
//! - Phase: the forward-only repair lifecycle
//! - FailureKind: the closed set of fault classifications
//! - Incident: facts accumulated during a run
//! - RunRecord: the canonical, single-writer run state
//! - Outcome: terminal result of a run

pub mod event;
pub mod failure;
pub mod incident;
pub mod outcome;
pub mod phase;
pub mod run_record;

pub use event::{Event, EventLevel, reasoning_transcript};
pub use failure::FailureKind;
pub use incident::Incident;
pub use outcome::Outcome;
pub use phase::Phase;
pub use run_record::{PollPage, ReportDocument, RunRecord};
