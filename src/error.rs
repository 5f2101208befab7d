//! Error types for Mender
//!
//! Centralized error handling using thiserror. Capability failures, inconclusive
//! classification, missing strategies and exhausted test retries are values on
//! the run record, not errors; only coordinator, wiring and I/O faults surface here.

use thiserror::Error;

/// All error types that can occur in Mender
#[derive(Debug, Error)]
pub enum MenderError {
    /// A repair run is already in flight
    #[error("Coordinator busy: {0}")]
    CoordinatorBusy(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failure kind token outside the injectable set
    #[error("Unknown failure kind: {0}")]
    UnknownFailureKind(String),

    /// Capability could not be invoked at all (not registered, bad input)
    #[error("Capability error: {0}")]
    Capability(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IPC communication error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Mender operations
pub type Result<T> = std::result::Result<T, MenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_busy_error() {
        let err = MenderError::CoordinatorBusy("repair already running".to_string());
        assert_eq!(err.to_string(), "Coordinator busy: repair already running");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = MenderError::InvalidState("cannot move from test to analyze".to_string());
        assert_eq!(err.to_string(), "Invalid state: cannot move from test to analyze");
    }

    #[test]
    fn test_unknown_failure_kind_error() {
        let err = MenderError::UnknownFailureKind("disk_full".to_string());
        assert_eq!(err.to_string(), "Unknown failure kind: disk_full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MenderError = io_err.into();
        assert!(matches!(err, MenderError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: MenderError = json_err.into();
        assert!(matches!(err, MenderError::Json(_)));
    }
}
