//! IPC Layer - Unix socket surface of the daemon
//!
//! This module provides:
//! - Message types for requests, responses and push events
//! - Unix socket server for the daemon
//! - Client for CLI commands
//!
//! Framing is one JSON document per line.

pub mod client;
pub mod messages;
pub mod server;

pub use client::{IpcClient, IpcClientConfig};
pub use messages::{DaemonError, DaemonEvent, DaemonRequest, DaemonResponse, ErrorCode, Events, IpcMessage, Methods};
pub use server::{IpcServer, IpcServerConfig, RequestHandler};
