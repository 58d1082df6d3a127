//! Shared utility functions used across command modules.

use std::path::Path;

use esxgate_core::{GatewayConfig, PolicyEngine, PolicyTables};

use crate::error::CliError;

/// Loads the gateway configuration from the optional CLI path, falling
/// back to defaults when no file is given.
pub fn load_config(config_path: Option<&Path>) -> Result<GatewayConfig, CliError> {
    match config_path {
        Some(path) => GatewayConfig::load_from_path(path)
            .map_err(|e| CliError::Config(e.to_string())),
        None => Ok(GatewayConfig::default()),
    }
}

/// Builds the policy engine from the configuration: the table override
/// file when one is configured, the built-in tables otherwise.
pub fn build_policy_engine(config: &GatewayConfig) -> Result<PolicyEngine, CliError> {
    let tables = match &config.policy_tables_path {
        Some(path) => {
            PolicyTables::load_from_path(path).map_err(|e| CliError::Policy(e.to_string()))?
        }
        None => PolicyTables::builtin(),
    };
    PolicyEngine::new(tables).map_err(|e| CliError::Policy(e.to_string()))
}
