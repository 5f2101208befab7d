//! Daemon context - shared state for request handlers
//!
//! DaemonContext owns the run coordinator, the chat session answering
//! `chat.send`, and the sender for pushing events to subscribed clients.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::chat::ChatSession;
use crate::config::Config;
use crate::coordinator::RunCoordinator;
use crate::ipc::messages::DaemonEvent;

/// Shared context for all daemon request handlers
pub struct DaemonContext {
    pub coordinator: Arc<RunCoordinator>,
    pub chat: Arc<ChatSession>,
    /// Event broadcasting to subscribed clients
    pub event_tx: broadcast::Sender<DaemonEvent>,
}

impl DaemonContext {
    pub fn new(coordinator: Arc<RunCoordinator>, config: &Config, event_tx: broadcast::Sender<DaemonEvent>) -> Self {
        let chat = Arc::new(ChatSession::new(coordinator.clone(), config.session.clone()));
        Self {
            coordinator,
            chat,
            event_tx,
        }
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast(&self, event: DaemonEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.event_tx.subscribe()
    }
}
