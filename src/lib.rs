//! Mender - an autonomous repair orchestrator
//!
//! Mender drives a fixed six-phase repair cycle (detect, analyze, patch, test,
//! deploy, report) against a target service, one run at a time, and streams
//! the run's trace to pollers and live chat sessions.

pub mod bridge;
pub mod capability;
pub mod chat;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod domain;
pub mod engine;
pub mod error;
pub mod id;
pub mod ipc;
pub mod service_log;
pub mod strategy;

pub use error::{MenderError, Result};
