//! IPC client for the CLI to talk to a running daemon.
//!
//! Provides async connection to the daemon Unix socket with:
//! - Request/response communication
//! - Event subscription and streaming

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::config::IpcConfig;
use crate::error::{MenderError, Result};
use crate::ipc::messages::{DaemonEvent, DaemonRequest, DaemonResponse, IpcMessage, Methods};

/// Configuration for IPC client.
#[derive(Debug, Clone)]
pub struct IpcClientConfig {
    pub socket_path: PathBuf,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for IpcClientConfig {
    fn default() -> Self {
        Self {
            socket_path: IpcConfig::default().socket_path,
            request_timeout_ms: 30000,
        }
    }
}

impl IpcClientConfig {
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Default::default()
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<DaemonResponse>>>>;

/// IPC client for communicating with the daemon.
pub struct IpcClient {
    config: IpcClientConfig,
    writer: Arc<Mutex<Option<tokio::io::WriteHalf<UnixStream>>>>,
    pending: Pending,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    event_sender: mpsc::Sender<DaemonEvent>,
    event_receiver: Mutex<mpsc::Receiver<DaemonEvent>>,
}

impl IpcClient {
    pub fn new(config: IpcClientConfig) -> Self {
        let (event_sender, event_receiver) = mpsc::channel(256);
        Self {
            config,
            writer: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            connected: Arc::new(AtomicBool::new(false)),
            event_sender,
            event_receiver: Mutex::new(event_receiver),
        }
    }

    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self::new(IpcClientConfig::with_socket(path))
    }

    /// Connect to daemon.
    pub async fn connect(&self) -> Result<()> {
        let stream = UnixStream::connect(&self.config.socket_path).await.map_err(|e| {
            MenderError::Ipc(format!(
                "Failed to connect to {}: {} (is `mender daemon` running?)",
                self.config.socket_path.display(),
                e
            ))
        })?;

        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(writer);
        self.connected.store(true, Ordering::SeqCst);

        let pending = Arc::clone(&self.pending);
        let event_sender = self.event_sender.clone();
        let connected = Arc::clone(&self.connected);

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => {
                        connected.store(false, Ordering::SeqCst);
                        break;
                    }
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        match serde_json::from_str::<IpcMessage>(line) {
                            Ok(IpcMessage::Response(response)) => {
                                if let Some(sender) = pending.lock().await.remove(&response.id) {
                                    let _ = sender.send(response);
                                }
                            }
                            Ok(IpcMessage::Event(event)) => {
                                let _ = event_sender.send(event).await;
                            }
                            Ok(IpcMessage::Request(_)) | Err(_) => {
                                log::debug!("Ignoring unexpected daemon line: {}", line);
                            }
                        }
                    }
                }
            }
            // Fail any waiters
            pending.lock().await.clear();
        });

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Send a request and wait for response.
    pub async fn request(&self, method: &str, params: serde_json::Value) -> Result<DaemonResponse> {
        if !self.is_connected() {
            return Err(MenderError::Ipc("Not connected".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = DaemonRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut json = serde_json::to_string(&request)?;
        json.push('\n');
        {
            let mut writer = self.writer.lock().await;
            let Some(w) = writer.as_mut() else {
                self.pending.lock().await.remove(&id);
                return Err(MenderError::Ipc("Writer not available".into()));
            };
            w.write_all(json.as_bytes())
                .await
                .map_err(|e| MenderError::Ipc(format!("Failed to write: {}", e)))?;
            w.flush()
                .await
                .map_err(|e| MenderError::Ipc(format!("Failed to flush: {}", e)))?;
        }

        let timeout = tokio::time::Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(MenderError::Ipc("Connection closed before response".into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(MenderError::Ipc("Request timeout".into()))
            }
        }
    }

    pub async fn request_no_params(&self, method: &str) -> Result<DaemonResponse> {
        self.request(method, serde_json::json!({})).await
    }

    /// Receive next pushed event (waits until one is available).
    pub async fn recv_event(&self) -> Option<DaemonEvent> {
        self.event_receiver.lock().await.recv().await
    }

    pub async fn ping(&self) -> Result<bool> {
        Ok(self.request_no_params(Methods::PING).await?.is_success())
    }

    /// Start receiving pushed events on this connection.
    pub async fn subscribe(&self) -> Result<DaemonResponse> {
        self.request_no_params(Methods::SUBSCRIBE).await
    }

    pub async fn trigger(&self, kind: &str) -> Result<DaemonResponse> {
        self.request(Methods::REPAIR_TRIGGER, serde_json::json!({ "kind": kind }))
            .await
    }

    pub async fn status(&self) -> Result<DaemonResponse> {
        self.request_no_params(Methods::REPAIR_STATUS).await
    }

    pub async fn poll(&self, since: usize) -> Result<DaemonResponse> {
        self.request(Methods::REPAIR_POLL, serde_json::json!({ "since": since }))
            .await
    }

    pub async fn reset(&self) -> Result<DaemonResponse> {
        self.request_no_params(Methods::REPAIR_RESET).await
    }

    pub async fn cancel(&self) -> Result<DaemonResponse> {
        self.request_no_params(Methods::REPAIR_CANCEL).await
    }

    pub async fn report(&self) -> Result<DaemonResponse> {
        self.request_no_params(Methods::REPAIR_REPORT).await
    }

    pub async fn chat_send(&self, message: &str) -> Result<DaemonResponse> {
        self.request(Methods::CHAT_SEND, serde_json::json!({ "message": message }))
            .await
    }
}
