//! Gateway configuration
//!
//! Loads and validates the gateway's runtime settings from TOML. Every
//! timeout shares the `[10, 300]` second clamp range so resource holding
//! time stays bounded no matter what the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{DEFAULT_TIMEOUT_SECS, clamp_timeout_secs};

/// Default connect-phase timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-command execution timeout in seconds
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 60;

/// Default cap on concurrently held connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file '{path}': {reason}")]
    ReadFailed {
        /// Path that could not be read
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// The configuration file is not valid TOML
    #[error("Failed to parse config file '{path}': {reason}")]
    ParseFailed {
        /// Path that failed to parse
        path: String,
        /// Underlying reason
        reason: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Runtime settings for the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Idle timeout applied when a request does not specify one, seconds
    pub default_timeout_secs: u64,
    /// Bound on the connect/authenticate phase, seconds
    pub connect_timeout_secs: u64,
    /// Bound on a single command execution, seconds
    pub execution_timeout_secs: u64,
    /// Cap on concurrently held connections
    pub max_connections: usize,
    /// Optional policy-table override file
    pub policy_tables_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            execution_timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            policy_tables_path: None,
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file and normalizes it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(config.normalized())
    }

    /// Clamps every timeout into the permitted range.
    ///
    /// Idempotent; applied on load and again by the connection manager on
    /// construction, so a hand-built config cannot escape the clamp.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.default_timeout_secs = clamp_secs(self.default_timeout_secs);
        self.connect_timeout_secs = clamp_secs(self.connect_timeout_secs);
        self.execution_timeout_secs = clamp_secs(self.execution_timeout_secs);
        if self.max_connections == 0 {
            self.max_connections = DEFAULT_MAX_CONNECTIONS;
        }
        self
    }

    /// Sets the default idle timeout
    #[must_use]
    pub const fn with_default_timeout_secs(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    /// Sets the connect-phase timeout
    #[must_use]
    pub const fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Sets the execution timeout
    #[must_use]
    pub const fn with_execution_timeout_secs(mut self, secs: u64) -> Self {
        self.execution_timeout_secs = secs;
        self
    }

    /// Sets the connection cap
    #[must_use]
    pub const fn with_max_connections(mut self, cap: usize) -> Self {
        self.max_connections = cap;
        self
    }

    /// Sets the policy-table override file
    #[must_use]
    pub fn with_policy_tables_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_tables_path = Some(path.into());
        self
    }

    /// Connect-phase timeout as a duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Execution timeout as a duration
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

fn clamp_secs(secs: u64) -> u64 {
    clamp_timeout_secs(i64::try_from(secs).unwrap_or(i64::MAX))
}
