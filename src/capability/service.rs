//! restart_service capability

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Capability, CapabilityResult, Workspace, names};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRestart {
    pub message: String,
    pub timestamp: String,
}

/// Simulated restart: waits out the configured delay, then reports success
pub struct RestartService {
    delay: Duration,
}

impl RestartService {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl Capability for RestartService {
    fn name(&self) -> &'static str {
        names::RESTART_SERVICE
    }

    fn description(&self) -> &'static str {
        "Restart the target service"
    }

    async fn invoke(&self, _input: Value, _ws: &Workspace) -> eyre::Result<CapabilityResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        CapabilityResult::ok(&ServiceRestart {
            message: "Service restarted".to_string(),
            timestamp: Local::now().to_rfc3339(),
        })
    }
}
