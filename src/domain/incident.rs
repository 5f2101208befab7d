//! Incident facts accumulated over a single repair run.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::failure::FailureKind;

/// Everything learned about the current run, owned by the engine while it runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    /// Kind injected by the trigger
    pub injected: Option<FailureKind>,
    pub started_at: Option<DateTime<Local>>,

    //=== Detect ===
    pub detected_at: Option<String>,

    //=== Analyze ===
    pub analysis_at: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub root_cause: Option<String>,
    pub error_count: usize,

    //=== Patch ===
    pub fix_at: Option<String>,
    pub fix_description: Option<String>,
    pub diff: Option<String>,
    pub affected_resource: Option<String>,

    //=== Test ===
    pub test_at: Option<String>,
    pub test_attempts: u32,
    pub tests_passed: bool,

    //=== Deploy / Report ===
    pub recovered_at: Option<String>,
    pub duration: Option<String>,
    pub reasoning_log: Option<String>,
}

impl Incident {
    /// Start a fresh incident for an injected kind
    pub fn begin(injected: FailureKind) -> Self {
        Self {
            injected: Some(injected),
            started_at: Some(Local::now()),
            ..Default::default()
        }
    }

    /// Short identifier derived from the start time: `INC-YYYYmmddHHMM`
    pub fn incident_id(&self) -> String {
        let at = self.started_at.unwrap_or_else(Local::now);
        format!("INC-{}", at.format("%Y%m%d%H%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_begin_records_injected_kind() {
        let incident = Incident::begin(FailureKind::SqlError);
        assert_eq!(incident.injected, Some(FailureKind::SqlError));
        assert!(incident.started_at.is_some());
        assert!(incident.failure_kind.is_none());
        assert_eq!(incident.test_attempts, 0);
    }

    #[test]
    fn test_incident_id_uses_start_minute() {
        let incident = Incident {
            started_at: Some(Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()),
            ..Default::default()
        };
        assert_eq!(incident.incident_id(), "INC-202501020304");
    }
}
