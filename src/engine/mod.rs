//! Repair engine - phase machine, traced capability calls, run journal

mod journal;
mod runner;
mod trace;

pub use journal::RunJournal;
pub use runner::{RepairEngine, RunEnd, test_line_event};
pub use trace::{Trace, tool_line, tool_result_line, truncate_chars};
