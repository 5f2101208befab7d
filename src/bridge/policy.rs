//! Forwarding policies - which trace events a consumer gets to see

use crate::domain::{Event, EventLevel};

/// Info lines forwarded to chat when they contain one of these
const INFO_KEYWORDS: [&str; 9] = [
    "Root cause",
    "Affected",
    "Identified",
    "Applying",
    "Rebuilding",
    "Restarting",
    "Verifying",
    "Saved",
    "Compiling",
];

/// Per-session filter; stateful so it can dedupe
pub trait ForwardPolicy: Send {
    /// Text to forward for this event, or `None` to drop it
    fn forward(&mut self, event: &Event) -> Option<String>;
}

/// Everything, untouched
#[derive(Debug, Default)]
pub struct PassAll;

impl ForwardPolicy for PassAll {
    fn forward(&mut self, event: &Event) -> Option<String> {
        Some(event.message.clone())
    }
}

/// Chat-readable subset of the trace
///
/// Tool traffic, dividers and warnings are dropped. Phase, banner, error,
/// success and complete lines pass trimmed, minus repeats of the previous
/// such line. Info lines pass only when they carry a keyword and are never
/// deduped.
#[derive(Debug, Default)]
pub struct ChatPolicy {
    last_forwarded: Option<String>,
}

impl ChatPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn admits(event: &Event) -> bool {
        match event.level {
            EventLevel::Phase
            | EventLevel::Banner
            | EventLevel::Error
            | EventLevel::Success
            | EventLevel::Complete => true,
            EventLevel::Info => INFO_KEYWORDS.iter().any(|k| event.message.contains(k)),
            EventLevel::Tool | EventLevel::ToolResult | EventLevel::Divider | EventLevel::Warning => false,
        }
    }
}

impl ForwardPolicy for ChatPolicy {
    fn forward(&mut self, event: &Event) -> Option<String> {
        if !Self::admits(event) {
            return None;
        }
        let clean = event.message.trim();
        if clean.is_empty() {
            return None;
        }
        if event.level != EventLevel::Info {
            if self.last_forwarded.as_deref() == Some(clean) {
                return None;
            }
            self.last_forwarded = Some(clean.to_string());
        }
        Some(clean.to_string())
    }
}
