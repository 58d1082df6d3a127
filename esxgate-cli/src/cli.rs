//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `esxgate` command-line dispatcher for the diagnostic command gateway
#[derive(Parser)]
#[command(name = "esxgate-cli")]
#[command(author, version, about = "esxgate diagnostic gateway dispatcher")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the gateway configuration file (TOML)
    #[arg(short, long, global = true, env = "ESXGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except responses
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Process gateway requests
    #[command(about = "Read JSON requests (one per line) and write JSON responses")]
    Run {
        /// Read requests from this file instead of stdin
        file: Option<PathBuf>,
    },

    /// Policy engine operations
    #[command(subcommand)]
    Policy(PolicyCommands),
}

/// Policy engine subcommands
#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Validate a single command against the active policy
    #[command(about = "Check whether a command would be admitted")]
    Check {
        /// The command string to validate
        command: String,
    },

    /// Print the active policy tables as JSON
    #[command(about = "Show the active allow/deny tables")]
    Show,
}
