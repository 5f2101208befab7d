//! CLI module for mender - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the daemon
//! and driving repair runs against it.

pub mod commands;

pub use commands::{Cli, Commands};
