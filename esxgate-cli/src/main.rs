//! `esxgate` CLI - command-line dispatcher for the diagnostic command gateway
//!
//! Reads JSON gateway requests, drives the connection manager, and writes
//! JSON responses. Also exposes the policy engine directly for checking
//! commands and inspecting the active tables.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;
use esxgate_core::tracing::{TracingLevel, init_tracing};

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    if !cli.quiet {
        let level = match cli.verbose {
            0 => TracingLevel::Warn,
            1 => TracingLevel::Info,
            2 => TracingLevel::Debug,
            _ => TracingLevel::Trace,
        };
        // A second init can only happen in-process tests; ignore it
        let _ = init_tracing(level);
    }

    let result = commands::dispatch(config_path, cli.command);

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
