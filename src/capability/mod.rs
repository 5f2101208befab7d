//! Capabilities - the fixed set of actions the repair engine may take
//!
//! Every capability is scoped to a [`Workspace`] rooted at the target service
//! and reports through a uniform [`CapabilityResult`]; invocation never raises.

mod context;
mod files;
mod logs;
mod registry;
mod report;
mod service;
mod validation;

pub use context::{Workspace, WorkspaceError};
pub use files::{ReadResource, ResourceContent, ResourceWrite, WriteResource};
pub use logs::{ClassifyLog, ExceptionRef, FileRef, LogClassification, classify, root_cause_for};
pub use registry::{CapabilityRegistry, CapabilityResult};
pub use report::{RenderReport, RenderedReport, latest_report, render_markdown};
pub use service::{RestartService, ServiceRestart};
pub use validation::{RunValidationSuite, TestFailure, ValidationReport, parse_report};

use async_trait::async_trait;
use serde_json::Value;

/// Registered capability names
pub mod names {
    pub const READ_RESOURCE: &str = "read_resource";
    pub const WRITE_RESOURCE: &str = "write_resource";
    pub const RUN_VALIDATION_SUITE: &str = "run_validation_suite";
    pub const CLASSIFY_LOG: &str = "classify_log";
    pub const RESTART_SERVICE: &str = "restart_service";
    pub const RENDER_REPORT: &str = "render_report";
}

/// An action the engine can invoke by name
#[async_trait]
pub trait Capability: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Run the capability; errors are turned into failed results by the registry
    async fn invoke(&self, input: Value, ws: &Workspace) -> eyre::Result<CapabilityResult>;
}
