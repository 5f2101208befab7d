//! Run journal - each run's events as JSON lines under the data directory
//!
//! Appends are queued to a writer task that owns the run's one open file, so
//! emitting an event never touches the filesystem on the caller's thread.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use crate::domain::Event;
use crate::error::{MenderError, Result};

enum JournalOp {
    Append(String),
    Flush(oneshot::Sender<()>),
}

/// Append-only `<dir>/<run_id>.jsonl`
#[derive(Debug, Clone)]
pub struct RunJournal {
    path: PathBuf,
    tx: mpsc::UnboundedSender<JournalOp>,
}

impl RunJournal {
    /// Journal location for a run
    pub fn path_for(dir: impl AsRef<Path>, run_id: &str) -> PathBuf {
        dir.as_ref().join(format!("{}.jsonl", run_id))
    }

    /// Start the writer task for a run; the directory and file are created
    /// lazily by the writer. Must be called inside a tokio runtime.
    pub fn open(dir: impl AsRef<Path>, run_id: &str) -> Self {
        let path = Self::path_for(&dir, run_id);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(dir.as_ref().to_path_buf(), path.clone(), rx));
        Self { path, tx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one event
    pub fn append(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        self.tx
            .send(JournalOp::Append(line))
            .map_err(|_| MenderError::Io(std::io::Error::other("journal writer stopped")))
    }

    /// Wait until every queued event is on disk
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(JournalOp::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Read a journal file back
    pub async fn read_events(path: impl AsRef<Path>) -> Result<Vec<Event>> {
        let content = match fs::read_to_string(path.as_ref()).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Into::into))
            .collect()
    }
}

async fn write_loop(dir: PathBuf, path: PathBuf, mut rx: mpsc::UnboundedReceiver<JournalOp>) {
    let opened = match fs::create_dir_all(&dir).await {
        Ok(()) => OpenOptions::new().create(true).append(true).open(&path).await,
        Err(e) => Err(e),
    };
    let mut file = match opened {
        Ok(file) => file,
        Err(e) => {
            log::warn!("Run journal disabled for {}: {}", path.display(), e);
            while let Some(op) = rx.recv().await {
                if let JournalOp::Flush(ack) = op {
                    let _ = ack.send(());
                }
            }
            return;
        }
    };

    while let Some(op) = rx.recv().await {
        match op {
            JournalOp::Append(line) => {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    log::warn!("Failed to journal event to {}: {}", path.display(), e);
                }
            }
            JournalOp::Flush(ack) => {
                if let Err(e) = file.flush().await {
                    log::warn!("Failed to flush journal {}: {}", path.display(), e);
                }
                let _ = ack.send(());
            }
        }
    }
    let _ = file.flush().await;
}
