//! Run coordinator module
//!
//! Single-flight trigger/status/poll/reset/cancel over the one RunRecord.

mod run_coordinator;

pub use run_coordinator::RunCoordinator;
