//! run_validation_suite capability - runs the target's test command and parses counts

use std::time::Duration;

use async_trait::async_trait;
use eyre::eyre;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use super::{Capability, CapabilityResult, Workspace, names};
use crate::config::ValidationConfig;

/// A single failing test with its short reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub test: String,
    pub reason: String,
}

/// Output of run_validation_suite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub failures: Vec<TestFailure>,
    pub raw_output: String,
}

impl ValidationReport {
    /// Report for a suite that never produced output
    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            errors: 1,
            raw_output: message.into(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Parse pytest-style verbose output into counts and failures
///
/// Per-line markers are counted first. When none are found and the command
/// exited non-zero, the `N passed / N failed / N error` summary is used.
pub fn parse_report(output: &str, exit_ok: bool) -> eyre::Result<ValidationReport> {
    let mut passed = output.matches(" PASSED").count();
    let mut failed = output.matches(" FAILED").count();
    let mut errors = output.matches(" ERROR").count();

    if passed == 0 && failed == 0 && !exit_ok {
        let summary = |pattern: &str| -> eyre::Result<usize> {
            let re = Regex::new(pattern)?;
            Ok(re
                .captures(output)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0))
        };
        passed = summary(r"(\d+) passed")?;
        failed = summary(r"(\d+) failed")?;
        errors = summary(r"(\d+) error")?;
    }

    let failure_re = Regex::new(r"FAILED ([\w/:\\.\[\]-]+) - (.+)")?;
    let failures = failure_re
        .captures_iter(output)
        .filter_map(|c| {
            Some(TestFailure {
                test: c.get(1)?.as_str().to_string(),
                reason: c.get(2)?.as_str().trim().to_string(),
            })
        })
        .collect();

    Ok(ValidationReport {
        passed,
        failed,
        errors,
        failures,
        raw_output: output.to_string(),
    })
}

/// Keep at most `max_bytes` of `text`, cut on a char boundary
fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Runs the configured suite command in the workspace root
pub struct RunValidationSuite {
    command: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl RunValidationSuite {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
            max_output_bytes: ValidationConfig::default().max_output_bytes,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_output_bytes: config.max_output_bytes,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Capability for RunValidationSuite {
    fn name(&self) -> &'static str {
        names::RUN_VALIDATION_SUITE
    }

    fn description(&self) -> &'static str {
        "Run the target's test suite and report pass/fail counts"
    }

    async fn invoke(&self, _input: Value, ws: &Workspace) -> eyre::Result<CapabilityResult> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new("sh")
                .args(["-c", &self.command])
                .current_dir(ws.root())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match output {
            Ok(Ok(output)) => {
                let combined = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                let exit_ok = output.status.success();

                let mut report = parse_report(&combined, exit_ok)?;
                report.raw_output = truncate_bytes(&report.raw_output, self.max_output_bytes);

                log::debug!(
                    "Validation suite: {} passed, {} failed, {} errors (exit ok: {})",
                    report.passed,
                    report.failed,
                    report.errors,
                    exit_ok
                );
                CapabilityResult::with_status(report.is_clean() && exit_ok, &report)
            }
            Ok(Err(e)) => Err(eyre!("Failed to start validation suite: {}", e)),
            Err(_) => {
                log::warn!("Validation suite timed out after {:?}", self.timeout);
                let report =
                    ValidationReport::errored(format!("validation suite timed out after {:?}", self.timeout));
                CapabilityResult::with_status(false, &report)
            }
        }
    }
}
