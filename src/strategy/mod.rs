//! Fix strategies - one remediation per failure kind
//!
//! A strategy reads the resource it owns, computes corrected content with a
//! pure [`FixStrategy::patch`], and writes it back. Re-applying a strategy to
//! content it already fixed is a successful no-op.

mod builtin;
mod table;

pub use builtin::{ColumnNameFix, LoopIncrementFix, NullGuardFix};
pub use table::{StrategyTable, heuristic_kind};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::FailureKind;

/// Result of attempting a fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FixResult {
    Applied {
        affected_resource: String,
        description: String,
        diff: String,
    },
    Failed {
        reason: String,
    },
}

impl FixResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        FixResult::Failed { reason: reason.into() }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, FixResult::Applied { .. })
    }
}

/// Result of the pure content transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patched {
    /// Defect found and replaced
    Changed(String),
    /// Content already carries the fix
    AlreadyFixed,
}

/// Resource access handed to a strategy by the engine
///
/// Implementations route through the capability registry so that every read
/// and write shows up in the run's tool trace.
#[async_trait]
pub trait PatchContext: Send + Sync {
    async fn read(&self, resource: &str) -> Result<String, String>;

    async fn write(&self, resource: &str, content: &str) -> Result<(), String>;

    /// Narrate a step of the fix
    fn note(&self, message: &str);
}

#[async_trait]
pub trait FixStrategy: Send + Sync {
    fn kind(&self) -> FailureKind;

    /// The one resource this strategy reads and writes
    fn resource(&self) -> &'static str;

    /// What was found, e.g. "missing None guard on line 18"
    fn diagnosis(&self) -> &'static str;

    /// What will be changed
    fn action(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn diff(&self) -> &'static str;

    /// Compute corrected content; `Err` when the defect cannot be located
    fn patch(&self, content: &str) -> Result<Patched, String>;

    /// Read, patch and write back the owned resource
    async fn attempt(&self, ctx: &dyn PatchContext) -> FixResult {
        let resource = self.resource();
        ctx.note(&format!("Reading {} …", resource));
        let content = match ctx.read(resource).await {
            Ok(content) => content,
            Err(reason) => return FixResult::failed(reason),
        };

        ctx.note(&format!("Identified: {}", self.diagnosis()));
        ctx.note(&format!("Applying patch: {}", self.action()));

        match self.patch(&content) {
            Ok(Patched::Changed(patched)) => {
                if let Err(reason) = ctx.write(resource, &patched).await {
                    return FixResult::failed(reason);
                }
            }
            Ok(Patched::AlreadyFixed) => {
                ctx.note(&format!("{} already patched, nothing to write", resource));
            }
            Err(reason) => return FixResult::failed(reason),
        }

        FixResult::Applied {
            affected_resource: resource.to_string(),
            description: self.description().to_string(),
            diff: self.diff().to_string(),
        }
    }
}

/// Replace `defect` with `fixed` once, treating present `fixed` text as done
pub(crate) fn replace_defect(content: &str, defect: &str, fixed: &str, resource: &str) -> Result<Patched, String> {
    if content.contains(defect) {
        Ok(Patched::Changed(content.replacen(defect, fixed, 1)))
    } else if content.contains(fixed) {
        Ok(Patched::AlreadyFixed)
    } else {
        Err(format!("Defect not found in {}", resource))
    }
}
