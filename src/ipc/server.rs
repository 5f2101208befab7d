//! IPC Server - Unix socket server for the daemon
//!
//! Provides:
//! - Unix stream socket listener
//! - Client connection handling
//! - Request routing and response sending
//! - Event broadcasting to subscribers

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::IpcConfig;
use crate::error::{MenderError, Result};
use crate::ipc::messages::{DaemonError, DaemonEvent, DaemonRequest, DaemonResponse, Methods};

/// Configuration for the IPC server
#[derive(Debug, Clone)]
pub struct IpcServerConfig {
    pub socket_path: PathBuf,
    /// Maximum number of concurrent clients
    pub max_clients: usize,
    pub event_channel_capacity: usize,
}

impl Default for IpcServerConfig {
    fn default() -> Self {
        Self::from(&IpcConfig::default())
    }
}

impl From<&IpcConfig> for IpcServerConfig {
    fn from(config: &IpcConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            max_clients: config.max_clients,
            event_channel_capacity: config.event_channel_capacity,
        }
    }
}

impl IpcServerConfig {
    pub fn with_socket_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.socket_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }
}

/// Handler trait for processing requests
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: DaemonRequest) -> impl std::future::Future<Output = DaemonResponse> + Send;
}

/// Connected client state
#[derive(Debug)]
struct ClientState {
    subscribed: bool,
}

type Clients = Arc<RwLock<HashMap<u64, ClientState>>>;

/// IPC Server for daemon communication
pub struct IpcServer {
    config: IpcServerConfig,
    clients: Clients,
    event_tx: broadcast::Sender<DaemonEvent>,
    next_client_id: Arc<RwLock<u64>>,
}

impl IpcServer {
    pub fn new(config: IpcServerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            config,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            next_client_id: Arc::new(RwLock::new(1)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Sender for pushing events to subscribed clients
    pub fn event_sender(&self) -> broadcast::Sender<DaemonEvent> {
        self.event_tx.clone()
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast(&self, event: DaemonEvent) -> usize {
        self.event_tx.send(event).unwrap_or(0)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Accept clients until `shutdown` is cancelled
    pub async fn run<H: RequestHandler + 'static>(&self, handler: Arc<H>, shutdown: CancellationToken) -> Result<()> {
        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }
        if let Some(parent) = self.config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.config.socket_path)
            .map_err(|e| MenderError::Ipc(format!("Failed to bind socket: {}", e)))?;
        log::info!("IPC server listening on {}", self.config.socket_path.display());

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => self.accept(stream, &handler).await,
                        Err(e) => log::warn!("Accept error: {}", e),
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        let _ = std::fs::remove_file(&self.config.socket_path);
        log::info!("IPC server stopped");
        Ok(())
    }

    async fn accept<H: RequestHandler + 'static>(&self, stream: UnixStream, handler: &Arc<H>) {
        if self.clients.read().await.len() >= self.config.max_clients {
            log::warn!("Rejecting client: {} clients connected", self.config.max_clients);
            return;
        }

        let client_id = {
            let mut id = self.next_client_id.write().await;
            let current = *id;
            *id += 1;
            current
        };
        self.clients
            .write()
            .await
            .insert(client_id, ClientState { subscribed: false });
        log::debug!("Client {} connected", client_id);

        let handler = Arc::clone(handler);
        let clients = Arc::clone(&self.clients);
        let event_rx = self.event_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, client_id, handler, clients.clone(), event_rx).await {
                log::debug!("Client {} ended: {}", client_id, e);
            }
            clients.write().await.remove(&client_id);
        });
    }
}

async fn write_line<T: serde::Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

/// Handle a single client connection
async fn handle_client<H: RequestHandler>(
    stream: UnixStream,
    client_id: u64,
    handler: Arc<H>,
    clients: Clients,
    mut event_rx: broadcast::Receiver<DaemonEvent>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        tokio::select! {
            read_result = reader.read_line(&mut line) => {
                if read_result? == 0 {
                    break;
                }
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let response = match serde_json::from_str::<DaemonRequest>(trimmed) {
                        Ok(request) if request.method == Methods::SUBSCRIBE => {
                            if let Some(state) = clients.write().await.get_mut(&client_id) {
                                state.subscribed = true;
                            }
                            DaemonResponse::success(request.id, serde_json::json!({"subscribed": true}))
                        }
                        Ok(request) => {
                            log::debug!("Client {} → {}", client_id, request.method);
                            handler.handle(request).await
                        }
                        Err(e) => DaemonResponse::error(0, DaemonError::parse_error(format!("Parse error: {}", e))),
                    };
                    write_line(&mut writer, &response).await?;
                }
                line.clear();
            }
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => {
                        let subscribed = clients.read().await.get(&client_id).is_some_and(|s| s.subscribed);
                        if subscribed {
                            write_line(&mut writer, &event).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("Client {} lagged, skipped {} events", client_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    Ok(())
}
