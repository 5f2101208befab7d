use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MenderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub workspace: WorkspaceConfig,
    pub repair: RepairConfig,
    pub validation: ValidationConfig,
    pub session: SessionConfig,
    pub ipc: IpcConfig,
}

/// Where the target service lives and where artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root of the target service; all resource paths are sandboxed to it
    pub root: PathBuf,
    /// Service log, relative to root
    pub log_path: String,
    /// Postmortem directory, relative to root
    pub reports_dir: String,
    /// Run journals
    pub data_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            log_path: "logs/app.log".to_string(),
            reports_dir: "postmortems".to_string(),
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mender"),
        }
    }
}

/// Phase machine pacing and retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub max_test_attempts: u32,
    pub phase_pause_ms: u64,
    pub step_pause_ms: u64,
    pub attempt_pause_ms: u64,
    pub restart_delay_ms: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_test_attempts: 3,
            phase_pause_ms: 800,
            step_pause_ms: 400,
            attempt_pause_ms: 800,
            restart_delay_ms: 800,
        }
    }
}

impl RepairConfig {
    /// No narrative pauses at all
    pub fn instant() -> Self {
        Self {
            phase_pause_ms: 0,
            step_pause_ms: 0,
            attempt_pause_ms: 0,
            restart_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn phase_pause(&self) -> Duration {
        Duration::from_millis(self.phase_pause_ms)
    }

    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    pub fn attempt_pause(&self) -> Duration {
        Duration::from_millis(self.attempt_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub command: String,
    pub timeout_ms: u64,
    pub max_output_bytes: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            command: "python -m pytest tests/ -v --tb=short --no-header".to_string(),
            timeout_ms: 60000,
            max_output_bytes: 4000,
        }
    }
}

/// Real-time chat session behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub report_preview_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 120,
            report_preview_chars: 1800,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    pub socket_path: PathBuf,
    pub max_clients: usize,
    pub event_channel_capacity: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/mender-daemon.sock"),
            max_clients: 16,
            event_channel_capacity: 256,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            workspace: WorkspaceConfig::default(),
            repair: RepairConfig::default(),
            validation: ValidationConfig::default(),
            session: SessionConfig::default(),
            ipc: IpcConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Reject settings the repair cycle cannot run with
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.repair.max_test_attempts == 0 {
            return Err(MenderError::Config("repair.max_test_attempts must be at least 1".into()));
        }
        if self.validation.command.trim().is_empty() {
            return Err(MenderError::Config("validation.command is empty".into()));
        }
        if self.session.idle_timeout_secs == 0 {
            return Err(MenderError::Config("session.idle_timeout_secs must be positive".into()));
        }
        if self.ipc.max_clients == 0 {
            return Err(MenderError::Config("ipc.max_clients must be positive".into()));
        }
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
