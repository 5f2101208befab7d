//! The target service's incident log resource
//!
//! Failure injection overwrites it with a traceback, analysis may append a
//! stub when it is missing, and reset empties it.

use std::io::ErrorKind;
use std::path::Path;

use chrono::Local;
use tokio::io::AsyncWriteExt;

use crate::capability::Workspace;
use crate::domain::FailureKind;
use crate::error::Result;

fn stamp(lines: &[&str]) -> String {
    let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
    lines.iter().map(|l| format!("{} - {}\n", ts, l)).collect()
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Replace the log with the traceback for an injected failure
pub async fn write_failure_log(ws: &Workspace, kind: FailureKind) -> Result<()> {
    let path = ws.log_file();
    ensure_parent(&path).await?;
    tokio::fs::write(&path, stamp(kind.failure_log_lines())).await?;
    log::info!("Injected {} failure log into {}", kind, path.display());
    Ok(())
}

/// Append a minimal traceback so analysis has something to classify
pub async fn append_stub_log(ws: &Workspace, kind: FailureKind) -> Result<()> {
    let path = ws.log_file();
    ensure_parent(&path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(stamp(kind.stub_log_lines()).as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Empty the log if it exists
pub async fn truncate(ws: &Workspace) -> Result<()> {
    let path = ws.log_file();
    match tokio::fs::metadata(&path).await {
        Ok(_) => {
            tokio::fs::write(&path, b"").await?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
