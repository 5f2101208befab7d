//! Chat session - answers chat commands and streams a triggered run

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;

use super::ChatCommand;
use crate::bridge::{ChatPolicy, SessionItem};
use crate::config::SessionConfig;
use crate::coordinator::RunCoordinator;
use crate::domain::{FailureKind, Outcome};
use crate::engine::truncate_chars;
use crate::error::MenderError;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Where chat replies go
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: String);
}

/// Command handler for one chat surface
pub struct ChatSession {
    coordinator: Arc<RunCoordinator>,
    config: SessionConfig,
}

fn valid_kinds() -> String {
    FailureKind::INJECTABLE
        .iter()
        .map(FailureKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn help_text() -> String {
    let mut text = format!("{}\n⚡  MENDER: AUTONOMOUS REPAIR AGENT\n{}\nAvailable commands:\n\n", RULE, RULE);
    text.push_str("/status\n  Show current system health\n\n");
    for kind in FailureKind::INJECTABLE {
        text.push_str(&format!("/inject {}\n  Trigger {}\n\n", kind, kind.symptom()));
    }
    text.push_str("/postmortem\n  Show the latest incident report\n\n");
    text.push_str("/reset\n  Reset system to healthy state\n\n");
    text.push_str("/help\n  Show this message\n");
    text.push_str(RULE);
    text
}

pub fn usage_text() -> String {
    let mut text = String::from("⚠️  Usage: /inject <type>\n\nTypes:\n");
    for kind in FailureKind::INJECTABLE {
        text.push_str(&format!("  {:<14} {}\n", kind.as_str(), kind.symptom()));
    }
    text
}

impl ChatSession {
    pub fn new(coordinator: Arc<RunCoordinator>, config: SessionConfig) -> Self {
        Self { coordinator, config }
    }

    /// Handle one incoming message. Returns false for non-command chatter,
    /// which gets no reply.
    pub async fn handle(&self, text: &str, sink: &dyn ReplySink) -> bool {
        let Some(command) = ChatCommand::parse(text) else {
            return false;
        };
        log::info!("Chat command: {:?}", command);

        match command {
            ChatCommand::Help => sink.send(help_text()).await,
            ChatCommand::Status => sink.send(self.status_text()).await,
            ChatCommand::Report => sink.send(self.report_text().await).await,
            ChatCommand::Reset => sink.send(self.reset_text().await).await,
            ChatCommand::Inject(None) => sink.send(usage_text()).await,
            ChatCommand::Inject(Some(token)) => self.inject(&token, sink).await,
            ChatCommand::Unknown(text) => {
                sink.send(format!(
                    "❓  Unknown command: {}\nType /help to see available commands.",
                    text
                ))
                .await
            }
        }
        true
    }

    fn status_text(&self) -> String {
        let record = self.coordinator.status();
        if record.running {
            return match record.phase.number() {
                Some(n) => format!(
                    "🔄  Repair cycle in progress… stand by.\nPhase:   {} · {}",
                    n,
                    record.phase.title()
                ),
                None => "🔄  Repair cycle in progress… stand by.".to_string(),
            };
        }

        let health = match record.outcome {
            Some(Outcome::Aborted) => "🔴  OFFLINE",
            _ => "🟢  HEALTHY",
        };
        let mut text = format!("⚡  SERVICE STATUS\n━━━━━━━━━━━━━━━━\nState:   {}", health);
        if let (Some(run_id), Some(outcome)) = (&record.run_id, record.outcome) {
            text.push_str(&format!("\nLast run: {} ({:?})", run_id, outcome));
        }
        if let Some(at) = &record.incident.recovered_at {
            text.push_str(&format!("\nLast repaired: {}", at));
        }
        text
    }

    async fn report_text(&self) -> String {
        let Some(report) = self.coordinator.latest_report().await else {
            return "📄  No postmortems found yet. Run /inject <type> first.".to_string();
        };
        let limit = self.config.report_preview_chars;
        let mut content = truncate_chars(&report.content, limit);
        if report.content.chars().count() > limit {
            content.push_str(&format!(
                "\n\n[… truncated. Full report saved to {}]",
                report.path.display()
            ));
        }
        format!("📄  LATEST POSTMORTEM\n{}", content)
    }

    async fn reset_text(&self) -> String {
        match self.coordinator.reset().await {
            Ok(()) => "↺  System reset to healthy state. Ready for next failure injection.".to_string(),
            Err(MenderError::CoordinatorBusy(_)) => {
                "⚠️  A repair is running. Reset is refused until it completes.".to_string()
            }
            Err(e) => format!("❌  Reset failed: {}", e),
        }
    }

    async fn inject(&self, token: &str, sink: &dyn ReplySink) {
        let kind = match FailureKind::parse_injectable(token) {
            Ok(kind) => kind,
            Err(_) => {
                sink.send(format!(
                    "❌  Unknown failure type: {}\nValid types: {}",
                    token,
                    valid_kinds()
                ))
                .await;
                return;
            }
        };

        // Attached before the trigger so the first phase event is not missed
        let mut live = self
            .coordinator
            .attach(Box::new(ChatPolicy::new()), self.config.idle_timeout());

        match self.coordinator.trigger(kind) {
            Ok(run_id) => {
                log::info!("Chat started {}", run_id);
                live.follow_run(run_id);
            }
            Err(MenderError::CoordinatorBusy(_)) => {
                sink.send("⚠️  A repair is already running. Wait for it to complete.".to_string())
                    .await;
                return;
            }
            Err(e) => {
                sink.send(format!("❌  Could not start repair: {}", e)).await;
                return;
            }
        }

        sink.send(format!(
            "🔴  FAILURE INJECTED\n━━━━━━━━━━━━━━━━━━━━━━━━━━\nType:  {}\nTime:  {}\n\n⚡ Autonomous repair sequence starting…\nEach phase will be narrated as it happens.",
            kind.display_label(),
            Local::now().format("%H:%M:%S")
        ))
        .await;

        while let Some(item) = live.next().await {
            match item {
                SessionItem::Message(text) => sink.send(text).await,
                SessionItem::Finished(sentinel) => {
                    sink.send(sentinel.render()).await;
                    break;
                }
                SessionItem::TimedOut => {
                    log::warn!("Chat session idled out while {} was running", kind);
                    sink.send("⏱️  Repair timeout. Check the daemon log.".to_string()).await;
                    break;
                }
            }
        }
    }
}
