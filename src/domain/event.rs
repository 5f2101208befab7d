//! Event trace entries.
//!
//! A run's trace is an append-only sequence of leveled, timestamped lines.
//! Insertion order is the authoritative timeline order.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::id::clock;

/// Severity / role of a trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Phase,
    Info,
    Warning,
    Error,
    Success,
    Tool,
    ToolResult,
    Divider,
    Banner,
    Complete,
}

impl EventLevel {
    /// Internal bookkeeping lines, excluded from the reasoning transcript
    pub fn is_bookkeeping(&self) -> bool {
        matches!(
            self,
            EventLevel::Tool | EventLevel::ToolResult | EventLevel::Divider | EventLevel::Banner
        )
    }

    /// Capability call/return lines
    pub fn is_tool(&self) -> bool {
        matches!(self, EventLevel::Tool | EventLevel::ToolResult)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Phase => "phase",
            EventLevel::Info => "info",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
            EventLevel::Success => "success",
            EventLevel::Tool => "tool",
            EventLevel::ToolResult => "tool_result",
            EventLevel::Divider => "divider",
            EventLevel::Banner => "banner",
            EventLevel::Complete => "complete",
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a run's chronological trace. Never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: EventLevel,
}

impl Event {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
            level,
        }
    }

    /// `HH:MM:SS` of the event
    pub fn clock(&self) -> String {
        clock(self.timestamp)
    }

    /// Transcript form: `[HH:MM:SS] message`
    pub fn transcript_line(&self) -> String {
        format!("[{}] {}", self.clock(), self.message)
    }
}

/// Concatenate the non-bookkeeping events into a reasoning transcript
pub fn reasoning_transcript(events: &[Event]) -> String {
    events
        .iter()
        .filter(|e| !e.level.is_bookkeeping())
        .map(Event::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}
