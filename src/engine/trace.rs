//! Run trace - the single write path for a run's events
//!
//! Every event goes to the run record (under one write lock), then the
//! bridge, the debug log and, if configured, the run journal.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use super::RunJournal;
use crate::bridge::NotificationBridge;
use crate::capability::CapabilityResult;
use crate::domain::{Event, EventLevel, RunRecord};

/// Argument reprs in a tool line are cut to this many chars
const ARG_REPR_CHARS: usize = 60;
/// Tool result lines are cut to this many chars
const RESULT_CHARS: usize = 180;

/// Cut `text` to at most `max` chars
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// `TOOL  name(k=repr, ...)` for a capability call
pub fn tool_line(name: &str, input: &Value) -> String {
    let args = match input {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, truncate_chars(&v.to_string(), ARG_REPR_CHARS)))
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };
    format!("TOOL  {}({})", name, args)
}

/// `      ✓  {brief}` for a capability result
pub fn tool_result_line(result: &CapabilityResult) -> String {
    let mark = if result.success { "✓" } else { "✗" };
    format!("      {}  {}", mark, truncate_chars(&result.brief(), RESULT_CHARS))
}

/// Shared handle the engine writes through
#[derive(Clone)]
pub struct Trace {
    record: Arc<RwLock<RunRecord>>,
    bridge: NotificationBridge,
    journal: Option<RunJournal>,
}

impl Trace {
    pub fn new(record: Arc<RwLock<RunRecord>>, bridge: NotificationBridge) -> Self {
        Self {
            record,
            bridge,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Append an event to the run and fan it out
    pub fn emit(&self, level: EventLevel, message: impl Into<String>) -> Event {
        let event = Event::new(level, message);
        self.write().append(event.clone());

        log::debug!("[{}] {}", event.level, event.message);
        self.bridge.publish(&event);
        if let Some(journal) = &self.journal
            && let Err(e) = journal.append(&event)
        {
            log::warn!("Failed to journal event to {}: {}", journal.path().display(), e);
        }
        event
    }

    pub fn info(&self, message: impl Into<String>) -> Event {
        self.emit(EventLevel::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> Event {
        self.emit(EventLevel::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Event {
        self.emit(EventLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Event {
        self.emit(EventLevel::Error, message)
    }

    /// Mutate the record under its write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut RunRecord) -> R) -> R {
        f(&mut self.write())
    }

    /// Read the record under its read lock
    pub fn read<R>(&self, f: impl FnOnce(&RunRecord) -> R) -> R {
        f(&self.read_guard())
    }

    /// Wait until the journal holds every event emitted so far
    pub async fn flush_journal(&self) {
        if let Some(journal) = &self.journal {
            journal.flush().await;
        }
    }

    pub fn bridge(&self) -> &NotificationBridge {
        &self.bridge
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunRecord> {
        self.record.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, RunRecord> {
        self.record.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeMessage;
    use crate::domain::FailureKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn running_trace() -> Trace {
        let mut record = RunRecord::idle();
        record.begin("run-t", FailureKind::NullPointer);
        Trace::new(Arc::new(RwLock::new(record)), NotificationBridge::new(16))
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("✓✓✓✓", 2), "✓✓");
    }

    #[test]
    fn test_tool_line_truncates_reprs() {
        let line = tool_line("write_resource", &json!({"path": "app/x.py", "content": "y".repeat(200)}));
        assert!(line.starts_with("TOOL  write_resource("));
        assert!(line.contains("path=\"app/x.py\""));
        assert!(!line.contains(&"y".repeat(ARG_REPR_CHARS)));
        assert!(line.chars().count() < 120);
        assert_eq!(tool_line("classify_log", &json!({})), "TOOL  classify_log()");
    }

    #[test]
    fn test_tool_result_line() {
        let ok = CapabilityResult::ok(&json!({"lines": 3})).unwrap();
        assert!(tool_result_line(&ok).trim_start().starts_with("✓"));
        let failed = CapabilityResult::failure("x".repeat(400));
        let line = tool_result_line(&failed);
        assert!(line.trim_start().starts_with("✗"));
        assert!(line.chars().count() <= RESULT_CHARS + 9);
    }

    #[tokio::test]
    async fn test_emit_reaches_record_bridge_and_journal() {
        let temp = TempDir::new().unwrap();
        let journal = RunJournal::open(temp.path(), "run-t");
        let trace = running_trace().with_journal(journal.clone());
        let mut rx = trace.bridge().subscribe();

        trace.info("   Polling /health endpoint …");

        assert_eq!(trace.read(|r| r.log.len()), 1);
        match rx.recv().await.unwrap() {
            BridgeMessage::Event(e) => assert_eq!(e.level, EventLevel::Info),
            other => panic!("unexpected {:?}", other),
        }
        trace.flush_journal().await;
        assert_eq!(RunJournal::read_events(journal.path()).await.unwrap().len(), 1);
    }

    #[test]
    fn test_update_mutates_record() {
        let trace = running_trace();
        trace.update(|r| r.incident.error_count = 4);
        assert_eq!(trace.read(|r| r.incident.error_count), 4);
    }
}
