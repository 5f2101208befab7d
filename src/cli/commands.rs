//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - daemon: run the repair daemon in the foreground
//! - trigger / status / reset / cancel / report: drive the run coordinator
//! - chat: send one chat command and print the replies

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mender - autonomous detect → patch → test → deploy repair cycles
#[derive(Parser, Debug)]
#[command(name = "mender")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon in the foreground
    Daemon,

    /// Inject a failure and start a repair run
    Trigger {
        /// Failure kind (null_pointer, sql_error, infinite_loop)
        kind: String,
    },

    /// Show the current run
    Status {
        /// Print events from this offset
        #[arg(short, long)]
        since: Option<usize>,

        /// Keep polling until the run completes
        #[arg(short, long)]
        follow: bool,
    },

    /// Reset the run record and empty the incident log
    Reset,

    /// Cancel the in-flight run
    Cancel,

    /// Print the latest postmortem
    Report,

    /// Send a chat command (e.g. `/inject sql_error`) and print the replies
    Chat {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_trigger() {
        let cli = Cli::try_parse_from(["mender", "trigger", "sql_error"]).unwrap();
        assert!(matches!(cli.command, Commands::Trigger { ref kind } if kind == "sql_error"));
    }

    #[test]
    fn test_parse_status_follow() {
        let cli = Cli::try_parse_from(["mender", "status", "--since", "4", "--follow"]).unwrap();
        match cli.command {
            Commands::Status { since, follow } => {
                assert_eq!(since, Some(4));
                assert!(follow);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_joins_words() {
        let cli = Cli::try_parse_from(["mender", "-v", "chat", "/inject", "null_pointer"]).unwrap();
        assert!(cli.is_verbose());
        match cli.command {
            Commands::Chat { message } => assert_eq!(message.join(" "), "/inject null_pointer"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["mender", "report", "--config", "/tmp/m.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.yml")));
        assert!(matches!(cli.command, Commands::Report));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["mender"]).is_err());
        assert!(Cli::try_parse_from(["mender", "chat"]).is_err());
    }
}
