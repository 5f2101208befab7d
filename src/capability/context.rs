//! Workspace context - every capability is scoped to the target service root

use std::path::{Component, Path, PathBuf};

use crate::config::WorkspaceConfig;

/// Execution context for capabilities
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Target service root - all resource paths are constrained here
    root: PathBuf,

    /// Service log, relative to root
    log_path: String,

    /// Postmortem directory, relative to root
    reports_dir: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = WorkspaceConfig::default();
        Self {
            root: root.into(),
            log_path: defaults.log_path,
            reports_dir: defaults.reports_dir,
        }
    }

    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self {
            root: config.root.clone(),
            log_path: config.log_path.clone(),
            reports_dir: config.reports_dir.clone(),
        }
    }

    pub fn with_log_path(mut self, log_path: impl Into<String>) -> Self {
        self.log_path = log_path.into();
        self
    }

    pub fn with_reports_dir(mut self, reports_dir: impl Into<String>) -> Self {
        self.reports_dir = reports_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Service log path relative to root
    pub fn log_resource(&self) -> &str {
        &self.log_path
    }

    /// Absolute (root-joined) service log path
    pub fn log_file(&self) -> PathBuf {
        self.root.join(&self.log_path)
    }

    pub fn reports_path(&self) -> PathBuf {
        self.root.join(&self.reports_dir)
    }

    /// Resolve a resource path, refusing anything that escapes the root
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, WorkspaceError> {
        if path.as_os_str().is_empty() {
            return Err(WorkspaceError::InvalidInput {
                message: "empty path".to_string(),
            });
        }

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(WorkspaceError::SandboxViolation {
                path: path.to_path_buf(),
                root: self.root.clone(),
            });
        }

        if path.is_absolute() {
            if path.starts_with(&self.root) {
                return Ok(path.to_path_buf());
            }
            return Err(WorkspaceError::SandboxViolation {
                path: path.to_path_buf(),
                root: self.root.clone(),
            });
        }

        Ok(self.root.join(path))
    }
}

/// Errors that can occur while resolving capability inputs
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Path {path} escapes workspace {root}")]
    SandboxViolation { path: PathBuf, root: PathBuf },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_path() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let resolved = ws.resolve(Path::new("app/database.py")).unwrap();
        assert_eq!(resolved, dir.path().join("app/database.py"));
    }

    #[test]
    fn test_resolve_rejects_parent_escape() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let err = ws.resolve(Path::new("../etc/passwd")).unwrap_err();
        assert!(matches!(err, WorkspaceError::SandboxViolation { .. }));
    }

    #[test]
    fn test_resolve_absolute_inside_and_outside() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let inside = dir.path().join("logs/app.log");
        assert_eq!(ws.resolve(&inside).unwrap(), inside);
        assert!(ws.resolve(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_resolve_rejects_empty() {
        let ws = Workspace::new("/srv");
        assert!(matches!(
            ws.resolve(Path::new("")),
            Err(WorkspaceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_default_locations() {
        let ws = Workspace::new("/srv/target");
        assert_eq!(ws.log_file(), PathBuf::from("/srv/target/logs/app.log"));
        assert_eq!(ws.reports_path(), PathBuf::from("/srv/target/postmortems"));
        let custom = ws.with_log_path("var/service.log").with_reports_dir("reports");
        assert_eq!(custom.log_resource(), "var/service.log");
        assert_eq!(custom.reports_path(), PathBuf::from("/srv/target/reports"));
    }
}
