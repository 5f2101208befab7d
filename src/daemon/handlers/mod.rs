//! Request handlers for the daemon
//!
//! Each submodule handles a category of IPC methods:
//! - repair: run lifecycle (trigger, status, poll, reset, cancel, report)
//! - chat: chat commands (send)

pub mod chat;
pub mod repair;

pub use chat::*;
pub use repair::*;

use std::sync::Arc;

use serde_json::json;

use crate::daemon::context::DaemonContext;
use crate::ipc::messages::{DaemonError, DaemonRequest, DaemonResponse, Methods};
use crate::ipc::server::RequestHandler;

/// Routes IPC requests to the handler functions
pub struct DaemonHandler {
    ctx: Arc<DaemonContext>,
}

impl DaemonHandler {
    pub fn new(ctx: Arc<DaemonContext>) -> Self {
        Self { ctx }
    }

    pub async fn dispatch(&self, request: DaemonRequest) -> DaemonResponse {
        let DaemonRequest { id, method, params } = request;
        let ctx = &self.ctx;
        match method.as_str() {
            Methods::PING => DaemonResponse::success(id, json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),
            Methods::REPAIR_TRIGGER => handle_repair_trigger(id, &params, ctx).await,
            Methods::REPAIR_STATUS => handle_repair_status(id, ctx).await,
            Methods::REPAIR_POLL => handle_repair_poll(id, &params, ctx).await,
            Methods::REPAIR_RESET => handle_repair_reset(id, ctx).await,
            Methods::REPAIR_CANCEL => handle_repair_cancel(id, ctx).await,
            Methods::REPAIR_REPORT => handle_repair_report(id, ctx).await,
            Methods::CHAT_SEND => handle_chat_send(id, &params, ctx).await,
            other => DaemonResponse::error(id, DaemonError::method_not_found(other)),
        }
    }
}

impl RequestHandler for DaemonHandler {
    fn handle(&self, request: DaemonRequest) -> impl std::future::Future<Output = DaemonResponse> + Send {
        self.dispatch(request)
    }
}
