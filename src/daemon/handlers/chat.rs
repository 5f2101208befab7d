//! Chat request handlers
//!
//! Handles chat.send. Replies are pushed to subscribed clients as
//! `chat.message` events; a final empty message with `done: true` closes
//! each exchange.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::chat::{ChatCommand, ReplySink};
use crate::daemon::context::DaemonContext;
use crate::ipc::messages::{DaemonError, DaemonEvent, DaemonResponse};

/// Pushes chat replies onto the daemon event channel
struct BroadcastSink {
    event_tx: broadcast::Sender<DaemonEvent>,
}

#[async_trait]
impl ReplySink for BroadcastSink {
    async fn send(&self, text: String) {
        let _ = self.event_tx.send(DaemonEvent::chat_message(&text, false));
    }
}

/// Handle chat.send - run a chat command in the background
pub async fn handle_chat_send(id: u64, params: &Value, ctx: &Arc<DaemonContext>) -> DaemonResponse {
    let message = match params["message"].as_str() {
        Some(m) => m.to_string(),
        None => return DaemonResponse::error(id, DaemonError::invalid_params("Missing 'message' parameter")),
    };

    // Chatter gets no reply and no background task
    if ChatCommand::parse(&message).is_none() {
        return DaemonResponse::success(id, json!({"handled": false}));
    }

    let chat = ctx.chat.clone();
    let event_tx = ctx.event_tx.clone();
    tokio::spawn(async move {
        let sink = BroadcastSink {
            event_tx: event_tx.clone(),
        };
        chat.handle(&message, &sink).await;
        let _ = event_tx.send(DaemonEvent::chat_message("", true));
    });

    DaemonResponse::success(id, json!({"handled": true}))
}
