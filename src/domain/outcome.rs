//! Repair run outcome types.

use serde::{Deserialize, Serialize};

/// Terminal result of a repair run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// All phases ran and the validation suite passed
    Success,
    /// All phases ran but the validation suite never passed
    PartialFailure,
    /// The run stopped before Deploy
    Aborted,
}

impl Outcome {
    /// The service was patched and redeployed (tests may still be failing)
    pub fn is_repaired(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::PartialFailure)
    }
}
