//! render_report capability - incident postmortem documents

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::{Capability, CapabilityResult, Workspace, names};
use crate::domain::Incident;

/// Output of render_report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedReport {
    pub path: String,
    pub content: String,
}

const RECOMMENDATIONS: [&str; 5] = [
    "Validate inputs at every public entry point of the service",
    "Check schema integrity when the service starts",
    "Put an iteration ceiling on unbounded loops",
    "Poll the health endpoint at 10 s or faster",
    "Run static analysis in CI before deploys",
];

/// Render the postmortem markdown for an incident
pub fn render_markdown(incident: &Incident, now: DateTime<Local>) -> String {
    let or = |value: &Option<String>, fallback: &str| value.clone().unwrap_or_else(|| fallback.to_string());
    let (status, severity_note) = if incident.tests_passed {
        ("RESOLVED", "autonomous repair completed")
    } else {
        ("MITIGATED", "service restored, validation did not fully pass")
    };
    let kind = incident
        .failure_kind
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut md = String::new();
    let _ = writeln!(md, "# Incident Postmortem");
    let _ = writeln!(md, "**Date:** {}", now.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(md, "**Incident ID:** {}", incident.incident_id());
    let _ = writeln!(md, "**Severity:** P1 (production outage)");
    let _ = writeln!(md, "**Status:** {} ({})", status, severity_note);
    let _ = writeln!(md, "\n---\n\n## Timeline\n");
    let _ = writeln!(md, "| Time | Event |");
    let _ = writeln!(md, "|------|-------|");
    for (at, event) in [
        (&incident.detected_at, "Health check failure detected"),
        (&incident.analysis_at, "Log analysis complete, root cause identified"),
        (&incident.fix_at, "Patch applied"),
        (&incident.test_at, "Validation suite finished"),
        (&incident.recovered_at, "Service health restored"),
    ] {
        let _ = writeln!(md, "| {} | {} |", or(at, "-"), event);
    }

    let _ = writeln!(md, "\n---\n\n## Root Cause");
    let _ = writeln!(md, "**Type:** `{}`\n", kind);
    let _ = writeln!(md, "{}\n", or(&incident.root_cause, "No root cause recorded."));
    let _ = writeln!(md, "**Resource:** `{}`", or(&incident.affected_resource, "unknown"));

    let _ = writeln!(md, "\n---\n\n## Patch Applied");
    let _ = writeln!(md, "```\n{}\n```\n", or(&incident.fix_description, "(no patch recorded)"));
    let _ = writeln!(md, "**Diff:**");
    let _ = writeln!(md, "```diff\n{}\n```", or(&incident.diff, "(no diff recorded)"));

    let _ = writeln!(md, "\n---\n\n## Impact");
    let _ = writeln!(md, "- **Duration:** {}", or(&incident.duration, "unknown"));
    let _ = writeln!(md, "- **Validation attempts:** {}", incident.test_attempts);
    let _ = writeln!(md, "- **Tests passing:** {}", if incident.tests_passed { "yes" } else { "no" });
    let _ = writeln!(md, "- **Errors in log:** {}", incident.error_count);

    let _ = writeln!(md, "\n---\n\n## Reasoning");
    let _ = writeln!(md, "```\n{}\n```", or(&incident.reasoning_log, "(transcript not captured)"));

    let _ = writeln!(md, "\n---\n\n## Recommendations");
    for (i, rec) in RECOMMENDATIONS.iter().enumerate() {
        let _ = writeln!(md, "{}. {}", i + 1, rec);
    }
    let _ = writeln!(md, "\n---\n*Generated by mender {} at {}*", env!("CARGO_PKG_VERSION"), now.to_rfc3339());
    md
}

/// Create a fresh report file, appending `_N` instead of overwriting
async fn create_report_file(dir: &Path, stem: &str) -> eyre::Result<(PathBuf, tokio::fs::File)> {
    for n in 0u32.. {
        let name = if n == 0 {
            format!("{}.md", stem)
        } else {
            format!("{}_{}.md", stem, n)
        };
        let path = dir.join(name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(eyre!("Failed to create '{}': {}", path.display(), e)),
        }
    }
    Err(eyre!("No free report name for {}", stem))
}

/// Newest `postmortem_*.md` in a directory
pub fn latest_report(dir: &Path) -> Option<PathBuf> {
    let pattern = dir.join("postmortem_*.md");
    let entries = glob::glob(&pattern.to_string_lossy()).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter_map(|p| {
            let modified = p.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .max()
        .map(|(_, p)| p)
}

pub struct RenderReport;

#[async_trait]
impl Capability for RenderReport {
    fn name(&self) -> &'static str {
        names::RENDER_REPORT
    }

    fn description(&self) -> &'static str {
        "Write the incident postmortem document"
    }

    async fn invoke(&self, input: Value, ws: &Workspace) -> eyre::Result<CapabilityResult> {
        let incident: Incident = serde_json::from_value(input["incident"].clone())
            .map_err(|e| eyre!("incident is required: {}", e))?;

        let now = Local::now();
        let content = render_markdown(&incident, now);

        let dir = ws.reports_path();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| eyre!("Failed to create '{}': {}", dir.display(), e))?;

        let stem = format!("postmortem_{}", now.format("%Y%m%d_%H%M%S"));
        let (path, mut file) = create_report_file(&dir, &stem).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        log::info!("Postmortem written to {}", path.display());
        CapabilityResult::ok(&RenderedReport {
            path: path.display().to_string(),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use tempfile::tempdir;

    fn sample_incident() -> Incident {
        Incident {
            failure_kind: Some(FailureKind::SqlError),
            root_cause: Some("wrong column".into()),
            affected_resource: Some("app/database.py".into()),
            diff: Some("- usr_email\n+ user_email".into()),
            tests_passed: true,
            test_attempts: 1,
            reasoning_log: Some("[10:00:00] PHASE 1".into()),
            ..Incident::begin(FailureKind::SqlError)
        }
    }

    #[test]
    fn test_markdown_sections() {
        let md = render_markdown(&sample_incident(), Local::now());
        for section in ["## Timeline", "## Root Cause", "## Patch Applied", "## Impact", "## Reasoning", "## Recommendations"] {
            assert!(md.contains(section), "missing {}", section);
        }
        assert!(md.contains("**Incident ID:** INC-"));
        assert!(md.contains("`sql_error`"));
        assert!(md.contains("+ user_email"));
        assert!(md.contains("RESOLVED"));
    }

    #[test]
    fn test_markdown_for_partial_failure() {
        let incident = Incident {
            tests_passed: false,
            ..sample_incident()
        };
        assert!(render_markdown(&incident, Local::now()).contains("MITIGATED"));
    }

    #[tokio::test]
    async fn test_reports_are_never_overwritten() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let input = serde_json::json!({ "incident": sample_incident() });

        let first = RenderReport.invoke(input.clone(), &ws).await.unwrap();
        let second = RenderReport.invoke(input, &ws).await.unwrap();
        let first: RenderedReport = first.decode().unwrap();
        let second: RenderedReport = second.decode().unwrap();

        assert_ne!(first.path, second.path);
        assert!(Path::new(&first.path).exists());
        assert!(Path::new(&second.path).exists());
        assert!(latest_report(&ws.reports_path()).is_some());
    }

    #[tokio::test]
    async fn test_missing_incident_is_an_error() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert!(RenderReport.invoke(Value::Null, &ws).await.is_err());
    }

    #[test]
    fn test_latest_report_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(latest_report(dir.path()).is_none());
    }
}
