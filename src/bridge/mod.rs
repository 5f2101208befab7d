//! Notification bridge - fans a run's trace out to live consumers
//!
//! The engine publishes every appended [`Event`] on one broadcast channel and
//! the coordinator publishes exactly one [`Sentinel`], tagged with the run id,
//! when a run finishes.
//! Each consumer attaches a [`LiveSession`] with its own [`ForwardPolicy`];
//! publishing never blocks and never waits on slow consumers.

mod policy;
mod session;

pub use policy::{ChatPolicy, ForwardPolicy, PassAll};
pub use session::{LiveSession, SessionItem};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::Event;

/// Terminal marker published after a run ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sentinel", rename_all = "snake_case")]
pub enum Sentinel {
    /// Run reached Complete; `tests_passed` is false for a partial failure
    Succeeded { tests_passed: bool },
    /// Run was aborted
    Failed { reason: String },
    /// Worker died unexpectedly
    Error { detail: String },
}

impl Sentinel {
    /// Chat-facing rendering of the sentinel
    pub fn render(&self) -> String {
        let divider = "━".repeat(26);
        match self {
            Sentinel::Succeeded { tests_passed } => format!(
                "{}\n✅  REPAIR COMPLETE\nService: HEALTHY  |  Tests: {}\nType /postmortem to read the full incident report.",
                divider,
                if *tests_passed { "PASS" } else { "PARTIAL" }
            ),
            Sentinel::Failed { reason } => format!(
                "{}\n❌  REPAIR FAILED ({})\nManual intervention required.\nType /postmortem for details.",
                divider, reason
            ),
            Sentinel::Error { detail } => format!("💥  Agent error: {}", detail),
        }
    }
}

/// What travels on the bridge channel
#[derive(Debug, Clone)]
pub enum BridgeMessage {
    Event(Event),
    Finished { run_id: String, sentinel: Sentinel },
}

/// Single-topic fan-out of run events
#[derive(Debug, Clone)]
pub struct NotificationBridge {
    tx: broadcast::Sender<BridgeMessage>,
}

impl NotificationBridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a trace event; returns the number of receivers reached
    pub fn publish(&self, event: &Event) -> usize {
        self.tx.send(BridgeMessage::Event(event.clone())).unwrap_or(0)
    }

    /// Publish a run's terminal sentinel
    pub fn finish(&self, run_id: &str, sentinel: Sentinel) -> usize {
        log::debug!("Bridge sentinel for {}: {:?}", run_id, sentinel);
        self.tx
            .send(BridgeMessage::Finished {
                run_id: run_id.to_string(),
                sentinel,
            })
            .unwrap_or(0)
    }

    /// Attach a consumer; it sees only messages published after this call
    pub fn attach(&self, policy: Box<dyn ForwardPolicy>, idle_timeout: Duration) -> LiveSession {
        LiveSession::new(self.tx.subscribe(), policy, idle_timeout)
    }

    /// Raw receiver for consumers that apply no policy
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeMessage> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBridge {
    fn default() -> Self {
        Self::new(256)
    }
}
