//! read_resource / write_resource capabilities

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{Capability, CapabilityResult, Workspace, names};

/// Output of read_resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub content: String,
    pub lines: usize,
}

/// Output of write_resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceWrite {
    pub bytes_written: usize,
    /// Copy of the previous content, if the resource existed
    pub backup: Option<String>,
    /// SHA-256 of the written content
    pub sha256: String,
}

pub struct ReadResource;

#[async_trait]
impl Capability for ReadResource {
    fn name(&self) -> &'static str {
        names::READ_RESOURCE
    }

    fn description(&self) -> &'static str {
        "Read a resource under the workspace root"
    }

    async fn invoke(&self, input: Value, ws: &Workspace) -> eyre::Result<CapabilityResult> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let full_path = ws.resolve(Path::new(path))?;

        let content = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| eyre!("Failed to read '{}': {}", path, e))?;

        let lines = content.matches('\n').count() + 1;
        CapabilityResult::ok(&ResourceContent { content, lines })
    }
}

pub struct WriteResource;

#[async_trait]
impl Capability for WriteResource {
    fn name(&self) -> &'static str {
        names::WRITE_RESOURCE
    }

    fn description(&self) -> &'static str {
        "Write a resource, backing up any previous content first"
    }

    async fn invoke(&self, input: Value, ws: &Workspace) -> eyre::Result<CapabilityResult> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let content = input["content"]
            .as_str()
            .ok_or_else(|| eyre!("content is required"))?;
        let full_path = ws.resolve(Path::new(path))?;

        let backup = if tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
            let backup_path = backup_path_for(&full_path);
            tokio::fs::copy(&full_path, &backup_path)
                .await
                .map_err(|e| eyre!("Failed to back up '{}': {}", path, e))?;
            Some(backup_path.display().to_string())
        } else {
            None
        };

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create directories for '{}': {}", path, e))?;
        }

        tokio::fs::write(&full_path, content)
            .await
            .map_err(|e| eyre!("Failed to write '{}': {}", path, e))?;

        CapabilityResult::ok(&ResourceWrite {
            bytes_written: content.len(),
            backup,
            sha256: hex::encode(Sha256::digest(content.as_bytes())),
        })
    }
}

/// `<file>.bak<HHMMSS><millis>` next to the original
fn backup_path_for(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%H%M%S%3f");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".bak{}", stamp));
    PathBuf::from(name)
}
