//! Repair request handlers
//!
//! Handles repair.* IPC methods by delegating to the RunCoordinator.

use serde_json::{Value, json};

use crate::daemon::context::DaemonContext;
use crate::domain::FailureKind;
use crate::ipc::messages::{DaemonError, DaemonResponse};

/// Handle repair.trigger - start a run for an injected failure kind
pub async fn handle_repair_trigger(id: u64, params: &Value, ctx: &DaemonContext) -> DaemonResponse {
    let token = match params["kind"].as_str() {
        Some(k) => k,
        None => return DaemonResponse::error(id, DaemonError::invalid_params("Missing 'kind' parameter")),
    };
    let kind = match FailureKind::parse_injectable(token) {
        Ok(kind) => kind,
        Err(e) => return DaemonResponse::error(id, DaemonError::from(&e)),
    };

    match ctx.coordinator.trigger(kind) {
        Ok(run_id) => DaemonResponse::success(
            id,
            json!({
                "run_id": run_id,
                "kind": kind,
                "label": kind.display_label(),
            }),
        ),
        Err(e) => DaemonResponse::error(id, DaemonError::from(&e)),
    }
}

/// Handle repair.status - full record snapshot
pub async fn handle_repair_status(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    match serde_json::to_value(ctx.coordinator.status()) {
        Ok(record) => DaemonResponse::success(id, record),
        Err(e) => DaemonResponse::error(id, DaemonError::internal_error(e.to_string())),
    }
}

/// Handle repair.poll - events from an offset plus status flags
pub async fn handle_repair_poll(id: u64, params: &Value, ctx: &DaemonContext) -> DaemonResponse {
    let since = params["since"].as_u64().unwrap_or(0) as usize;
    match serde_json::to_value(ctx.coordinator.poll(since)) {
        Ok(page) => DaemonResponse::success(id, page),
        Err(e) => DaemonResponse::error(id, DaemonError::internal_error(e.to_string())),
    }
}

/// Handle repair.reset - back to idle, incident log emptied
pub async fn handle_repair_reset(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    match ctx.coordinator.reset().await {
        Ok(()) => DaemonResponse::success(id, json!({"reset": true})),
        Err(e) => DaemonResponse::error(id, DaemonError::from(&e)),
    }
}

/// Handle repair.cancel - stop the in-flight run at its next checkpoint
pub async fn handle_repair_cancel(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    match ctx.coordinator.cancel() {
        Ok(()) => DaemonResponse::success(id, json!({"cancelled": true})),
        Err(e) => DaemonResponse::error(id, DaemonError::from(&e)),
    }
}

/// Handle repair.report - latest postmortem document
pub async fn handle_repair_report(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    match ctx.coordinator.latest_report().await {
        Some(report) => DaemonResponse::success(
            id,
            json!({
                "path": report.path,
                "content": report.content,
            }),
        ),
        None => DaemonResponse::error(id, DaemonError::not_found("No postmortem has been written yet")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::testing::PASSING;
    use crate::daemon::context::testing::fixture_context;
    use crate::ipc::messages::ErrorCode;

    #[tokio::test]
    async fn test_trigger_validates_kind() {
        let (_temp, ctx) = fixture_context(PASSING);
        let missing = handle_repair_trigger(1, &json!({}), &ctx).await;
        assert_eq!(missing.error.unwrap().code, ErrorCode::INVALID_PARAMS);

        let unknown = handle_repair_trigger(2, &json!({"kind": "unknown"}), &ctx).await;
        assert_eq!(unknown.error.unwrap().code, ErrorCode::INVALID_PARAMS);
        assert!(!ctx.coordinator.is_running());
    }

    #[tokio::test]
    async fn test_trigger_then_busy_then_poll() {
        let (_temp, ctx) = fixture_context("sleep 0.3; printf 't::a PASSED\\n'");
        let first = handle_repair_trigger(1, &json!({"kind": "sql_error"}), &ctx).await;
        let result = first.result.unwrap();
        assert!(result["run_id"].as_str().unwrap().starts_with("run-"));
        assert_eq!(result["kind"], "sql_error");

        let second = handle_repair_trigger(2, &json!({"kind": "null_pointer"}), &ctx).await;
        assert_eq!(second.error.unwrap().code, ErrorCode::COORDINATOR_BUSY);

        let reset = handle_repair_reset(3, &ctx).await;
        assert_eq!(reset.error.unwrap().code, ErrorCode::COORDINATOR_BUSY);

        ctx.coordinator.wait().await;
        let page = handle_repair_poll(4, &json!({"since": 2}), &ctx).await.result.unwrap();
        let total = page["total"].as_u64().unwrap() as usize;
        assert_eq!(page["events"].as_array().unwrap().len(), total - 2);
        assert_eq!(page["success"], true);
        assert_eq!(page["outcome"], "success");
    }

    #[tokio::test]
    async fn test_cancel_without_run() {
        let (_temp, ctx) = fixture_context(PASSING);
        let response = handle_repair_cancel(1, &ctx).await;
        assert_eq!(response.error.unwrap().code, ErrorCode::INVALID_STATE);
    }

    #[tokio::test]
    async fn test_report_after_run() {
        let (_temp, ctx) = fixture_context(PASSING);
        let none = handle_repair_report(1, &ctx).await;
        assert_eq!(none.error.unwrap().code, ErrorCode::NOT_FOUND);

        handle_repair_trigger(2, &json!({"kind": "infinite_loop"}), &ctx).await;
        ctx.coordinator.wait().await;
        let report = handle_repair_report(3, &ctx).await.result.unwrap();
        assert!(report["content"].as_str().unwrap().contains("Root Cause"));

        let status = handle_repair_status(4, &ctx).await.result.unwrap();
        assert_eq!(status["phase"], "complete");
        assert_eq!(status["incident"]["failure_kind"], "infinite_loop");
    }
}
