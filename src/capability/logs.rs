//! classify_log capability - turns a service log into a failure classification

use std::path::Path;

use async_trait::async_trait;
use eyre::eyre;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Capability, CapabilityResult, Workspace, names};
use crate::domain::FailureKind;

/// How many trailing error lines are reported
const RECENT_ERRORS: usize = 8;

/// A `File "x", line n` reference found in a traceback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file: String,
    pub line: u32,
}

/// An `XxxError: message` found in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRef {
    pub kind: String,
    pub message: String,
}

/// Output of classify_log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogClassification {
    pub error_count: usize,
    pub warning_count: usize,
    pub recent_errors: Vec<String>,
    pub file_refs: Vec<FileRef>,
    pub exception_types: Vec<ExceptionRef>,
    pub failure_kind: FailureKind,
    pub root_cause: String,
}

/// Classify raw log text
pub fn classify(text: &str) -> eyre::Result<LogClassification> {
    let file_ref_re = Regex::new(r#"File "([^"]+)", line (\d+)"#)?;
    let exception_re = Regex::new(r"(\w+Error|\w+Exception): (.+)")?;

    let errors: Vec<&str> = text.lines().filter(|l| l.contains("ERROR")).collect();
    let warning_count = text.lines().filter(|l| l.contains("WARNING")).count();

    let file_refs = file_ref_re
        .captures_iter(text)
        .filter_map(|c| {
            Some(FileRef {
                file: c.get(1)?.as_str().to_string(),
                line: c.get(2)?.as_str().parse().ok()?,
            })
        })
        .collect();

    let exception_types = exception_re
        .captures_iter(text)
        .filter_map(|c| {
            Some(ExceptionRef {
                kind: c.get(1)?.as_str().to_string(),
                message: c.get(2)?.as_str().trim().to_string(),
            })
        })
        .collect();

    let failure_kind = if text.contains("NoneType") || text.contains("AttributeError") {
        FailureKind::NullPointer
    } else if text.contains("usr_email") || text.contains("OperationalError") {
        FailureKind::SqlError
    } else if text.contains("MemoryError") || text.contains("infinite loop") {
        FailureKind::InfiniteLoop
    } else {
        FailureKind::Unknown
    };

    let recent_errors = errors[errors.len().saturating_sub(RECENT_ERRORS)..]
        .iter()
        .map(|l| l.to_string())
        .collect();

    Ok(LogClassification {
        error_count: errors.len(),
        warning_count,
        recent_errors,
        file_refs,
        exception_types,
        failure_kind,
        root_cause: root_cause_for(failure_kind).to_string(),
    })
}

/// Fixed root-cause narrative per kind
pub fn root_cause_for(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::NullPointer => {
            "None value passed to process_user_data(): missing null guard in app/broken_module.py line 18"
        }
        FailureKind::SqlError => {
            "SQL query references wrong column 'usr_email'; schema column is 'user_email' (app/database.py line 41)"
        }
        FailureKind::InfiniteLoop => {
            "calculate_stats() increments counter by 2; odd targets never terminate (app/broken_module.py line 52)"
        }
        FailureKind::Unknown => "Could not determine root cause",
    }
}

pub struct ClassifyLog;

#[async_trait]
impl Capability for ClassifyLog {
    fn name(&self) -> &'static str {
        names::CLASSIFY_LOG
    }

    fn description(&self) -> &'static str {
        "Count errors in the service log and classify the failure"
    }

    async fn invoke(&self, input: Value, ws: &Workspace) -> eyre::Result<CapabilityResult> {
        let path = input["path"].as_str().unwrap_or(ws.log_resource()).to_string();
        let full_path = ws.resolve(Path::new(&path))?;

        let text = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| eyre!("Failed to read log '{}': {}", path, e))?;

        CapabilityResult::ok(&classify(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn injected_log(kind: FailureKind) -> String {
        kind.failure_log_lines()
            .iter()
            .map(|l| format!("2025-01-01 00:00:00 - {}\n", l))
            .collect()
    }

    #[test]
    fn test_classifies_each_injected_kind() {
        for kind in FailureKind::INJECTABLE {
            let result = classify(&injected_log(kind)).unwrap();
            assert_eq!(result.failure_kind, kind);
            assert_eq!(result.error_count, 4);
        }
    }

    #[test]
    fn test_null_pointer_details() {
        let result = classify(&injected_log(FailureKind::NullPointer)).unwrap();
        assert!(result.root_cause.contains("broken_module.py"));
        assert_eq!(
            result.file_refs,
            vec![FileRef {
                file: "app/broken_module.py".into(),
                line: 18
            }]
        );
        assert_eq!(result.exception_types[0].kind, "AttributeError");
    }

    #[test]
    fn test_unknown_log() {
        let result = classify("2025 - WARNING - disk at 91%\n2025 - ERROR - kaboom\n").unwrap();
        assert_eq!(result.failure_kind, FailureKind::Unknown);
        assert_eq!(result.root_cause, "Could not determine root cause");
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.recent_errors, vec!["2025 - ERROR - kaboom".to_string()]);
    }

    #[test]
    fn test_recent_errors_keeps_last_eight() {
        let text: String = (0..12).map(|i| format!("ERROR - line {}\n", i)).collect();
        let result = classify(&text).unwrap();
        assert_eq!(result.error_count, 12);
        assert_eq!(result.recent_errors.len(), 8);
        assert_eq!(result.recent_errors[0], "ERROR - line 4");
    }

    #[tokio::test]
    async fn test_missing_log_fails() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert!(ClassifyLog.invoke(Value::Null, &ws).await.is_err());
    }

    #[tokio::test]
    async fn test_reads_workspace_log_by_default() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("logs/app.log"), injected_log(FailureKind::SqlError)).unwrap();
        let ws = Workspace::new(dir.path());

        let result = ClassifyLog.invoke(Value::Null, &ws).await.unwrap();
        let out: LogClassification = result.decode().unwrap();
        assert_eq!(out.failure_kind, FailureKind::SqlError);
    }
}
