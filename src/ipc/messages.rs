//! IPC message types for CLI ↔ Daemon communication.
//!
//! Uses JSON Lines (newline-delimited JSON) over Unix stream socket.
//! Message schema uses familiar field names (id, method, params, result, error)
//! but does NOT implement JSON-RPC 2.0 specification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::Sentinel;
use crate::domain::Event;
use crate::error::MenderError;

/// Request sent from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    /// Unique request ID for correlating responses.
    pub id: u64,
    /// Method name (e.g., "repair.trigger", "chat.send").
    pub method: String,
    /// Method parameters as JSON value.
    #[serde(default)]
    pub params: Value,
}

impl DaemonRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a request with no parameters.
    pub fn no_params(id: u64, method: impl Into<String>) -> Self {
        Self::new(id, method, Value::Object(Default::default()))
    }
}

/// Response sent from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    /// Request ID this response corresponds to.
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DaemonError>,
}

impl DaemonResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: DaemonError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Error details in a daemon response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DaemonError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PARSE_ERROR, message)
    }

    /// Method not found error (-32601).
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(ErrorCode::METHOD_NOT_FOUND, format!("Unknown method: {}", method.into()))
    }

    /// Invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, message)
    }

    /// Internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, message)
    }

    /// Invalid state error (1002).
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_STATE, message)
    }

    /// Coordinator busy error (1005).
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::COORDINATOR_BUSY, message)
    }

    /// Nothing to return yet (1006).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NOT_FOUND, message)
    }
}

impl From<&MenderError> for DaemonError {
    fn from(err: &MenderError) -> Self {
        match err {
            MenderError::CoordinatorBusy(_) => Self::busy(err.to_string()),
            MenderError::InvalidState(_) => Self::invalid_state(err.to_string()),
            MenderError::UnknownFailureKind(kind) => Self::with_data(
                ErrorCode::INVALID_PARAMS,
                err.to_string(),
                serde_json::json!({ "kind": kind }),
            ),
            _ => Self::internal_error(err.to_string()),
        }
    }
}

/// Standard error codes.
pub struct ErrorCode;

impl ErrorCode {
    /// Invalid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal daemon error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Run in wrong state for action.
    pub const INVALID_STATE: i32 = 1002;
    /// A repair is already running.
    pub const COORDINATOR_BUSY: i32 = 1005;
    /// Requested artifact does not exist yet.
    pub const NOT_FOUND: i32 = 1006;
}

/// Push event sent from the daemon (no request ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonEvent {
    /// Event type (e.g., "repair.event", "chat.message").
    pub event: String,
    pub data: Value,
}

impl DaemonEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Create a repair.event event.
    pub fn repair_event(event: &Event) -> Self {
        Self::new(Events::REPAIR_EVENT, serde_json::to_value(event).unwrap_or(Value::Null))
    }

    /// Create a repair.finished event: the sentinel fields plus `run_id`.
    pub fn repair_finished(run_id: &str, sentinel: &Sentinel) -> Self {
        let mut data = serde_json::to_value(sentinel).unwrap_or_else(|_| serde_json::json!({}));
        if let Value::Object(fields) = &mut data {
            fields.insert("run_id".to_string(), Value::String(run_id.to_string()));
        }
        Self::new(Events::REPAIR_FINISHED, data)
    }

    /// Create a chat.message event.
    pub fn chat_message(text: &str, done: bool) -> Self {
        Self::new(
            Events::CHAT_MESSAGE,
            serde_json::json!({
                "text": text,
                "done": done
            }),
        )
    }
}

/// IPC message enum for unified handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpcMessage {
    Request(DaemonRequest),
    Response(DaemonResponse),
    Event(DaemonEvent),
}

/// Known method names as constants.
pub struct Methods;

impl Methods {
    pub const PING: &'static str = "ping";
    pub const SUBSCRIBE: &'static str = "subscribe";

    // Repair
    pub const REPAIR_TRIGGER: &'static str = "repair.trigger";
    pub const REPAIR_STATUS: &'static str = "repair.status";
    pub const REPAIR_POLL: &'static str = "repair.poll";
    pub const REPAIR_RESET: &'static str = "repair.reset";
    pub const REPAIR_CANCEL: &'static str = "repair.cancel";
    pub const REPAIR_REPORT: &'static str = "repair.report";

    // Chat
    pub const CHAT_SEND: &'static str = "chat.send";
}

/// Known event names as constants.
pub struct Events;

impl Events {
    pub const REPAIR_EVENT: &'static str = "repair.event";
    pub const REPAIR_FINISHED: &'static str = "repair.finished";
    pub const CHAT_MESSAGE: &'static str = "chat.message";
}
