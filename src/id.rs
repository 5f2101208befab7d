//! ID and clock helpers
//!
//! Run identifiers and the wall-clock formats used in event traces and reports.

use chrono::{DateTime, Local};
use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Local::now().timestamp_millis()
}

/// Generate a unique run ID
///
/// Format: `run-{timestamp_ms}-{random_hex}`
/// Example: `run-1738300800123-a1b2`
pub fn generate_run_id() -> String {
    let random: u16 = rand::rng().random();
    format!("run-{}-{:04x}", now_ms(), random)
}

/// Wall-clock time of day as shown in event traces (`HH:MM:SS`)
pub fn clock(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Render an elapsed duration as `H:MM:SS`, dropping sub-second precision
pub fn format_elapsed(elapsed: chrono::TimeDelta) -> String {
    let total = elapsed.num_seconds().max(0);
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
