//! Policy inspection commands.

use std::path::Path;

use crate::error::CliError;
use crate::util::{build_policy_engine, load_config};

/// Validate a single command and print the verdict.
///
/// Exits nonzero when the command is denied so the result is scriptable.
pub fn cmd_check(config_path: Option<&Path>, command: &str) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let engine = build_policy_engine(&config)?;

    let result = engine.validate(command);
    if result.is_admitted() {
        println!("allowed: {}", result.reason);
        Ok(())
    } else {
        Err(CliError::Rejected(result.reason.to_string()))
    }
}

/// Print the active policy tables as pretty JSON.
pub fn cmd_show(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let engine = build_policy_engine(&config)?;

    let rendered = serde_json::to_string_pretty(engine.tables())
        .map_err(|e| CliError::Policy(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}
