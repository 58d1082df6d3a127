//! Policy tables: the command authorization contract as data
//!
//! The allow/prefix/deny/dangerous-token lists are configuration, not code.
//! Operators can audit or replace them through a TOML file without touching
//! the validation logic; the shipped built-in tables are the audited
//! security contract for ESXi diagnostic access.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading policy tables
#[derive(Debug, Error)]
pub enum PolicyTableError {
    /// The table file could not be read
    #[error("Failed to read policy table file '{path}': {reason}")]
    ReadFailed {
        /// Path that could not be read
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// The table file is not valid TOML
    #[error("Failed to parse policy table file '{path}': {reason}")]
    ParseFailed {
        /// Path that failed to parse
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// A table that must not be empty is empty
    #[error("Policy table '{0}' must not be empty")]
    EmptyTable(&'static str),
}

/// Result type for policy table operations
pub type PolicyTableResult<T> = std::result::Result<T, PolicyTableError>;

/// The four enumerated sets the policy engine evaluates against.
///
/// Immutable once handed to the engine. `Default` yields the built-in
/// contract; [`PolicyTables::load_from_path`] replaces it from a TOML file
/// with the same four keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTables {
    /// Exact invocations of known-safe diagnostic commands
    pub allowed_commands: Vec<String>,
    /// Approved command-family prefixes
    pub allowed_prefixes: Vec<String>,
    /// Destructive/escalation verbs denied at the start of a command
    pub denied_commands: Vec<String>,
    /// Privilege-escalation and shell/interpreter tokens denied anywhere
    /// in a command at word boundaries
    pub dangerous_tokens: Vec<String>,
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PolicyTables {
    /// Returns the built-in tables: the shipped security contract.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            allowed_commands: [
                // System information
                "vmware -v",
                "esxcli system version get",
                "esxcli hardware platform get",
                "uptime",
                // CPU and memory
                "esxcli hardware cpu list",
                "esxcli hardware memory get",
                "esxtop -b",
                // Storage
                "esxcli storage core device list",
                "esxcli storage vmfs extent list",
                "esxcli storage filesystem list",
                "df -h",
                // Network
                "esxcli network ip interface list",
                "esxcli network nic list",
                "esxcli network vm list",
                "esxcli network ip connection list",
                // Virtual machines
                "vim-cmd vmsvc/getallvms",
                "vim-cmd vmsvc/power.getstate",
                "esxcli vm process list",
                "vim-cmd vmsvc/get.summary",
                // Services
                "esxcli system service list",
                "chkconfig --list",
                "service --status-all",
                // Logs
                "tail -f /var/log/vmkernel.log",
                "tail -f /var/log/hostd.log",
                "tail -f /var/log/auth.log",
                // Performance
                "esxtop",
                "resxtop",
                "vsish",
                "vscsiStats",
            ]
            .map(String::from)
            .to_vec(),
            allowed_prefixes: [
                "vim-cmd vmsvc/",
                "esxcli",
                "tail -f /var/log/",
                "cat /var/log/",
                "ls",
                "df",
                "ps",
                "top",
                "uname",
                "hostname",
            ]
            .map(String::from)
            .to_vec(),
            denied_commands: [
                "rm", "mv", "cp", "chmod", "chown", "mkfs", "fdisk", "dd", "wget", "curl",
                "ssh", "telnet", "ftp", "nc", "reboot", "shutdown", "poweroff", "init", "kill",
                "killall",
            ]
            .map(String::from)
            .to_vec(),
            dangerous_tokens: ["sudo", "bash", "sh", "exec"].map(String::from).to_vec(),
        }
    }

    /// Loads policy tables from a TOML file.
    ///
    /// Missing keys fall back to the built-in tables, so an override file
    /// may replace a single list without restating the others.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, does not parse, or
    /// leaves a mandatory table empty.
    pub fn load_from_path(path: &Path) -> PolicyTableResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PolicyTableError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let tables: Self = toml::from_str(&raw).map_err(|e| PolicyTableError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tables.verify()?;
        Ok(tables)
    }

    /// Verifies that no mandatory table is empty.
    ///
    /// An empty denylist or dangerous-token list would silently widen the
    /// contract, so loading rejects it outright.
    ///
    /// # Errors
    /// Returns `PolicyTableError::EmptyTable` naming the offending table.
    pub fn verify(&self) -> PolicyTableResult<()> {
        if self.allowed_commands.is_empty() {
            return Err(PolicyTableError::EmptyTable("allowed_commands"));
        }
        if self.allowed_prefixes.is_empty() {
            return Err(PolicyTableError::EmptyTable("allowed_prefixes"));
        }
        if self.denied_commands.is_empty() {
            return Err(PolicyTableError::EmptyTable("denied_commands"));
        }
        if self.dangerous_tokens.is_empty() {
            return Err(PolicyTableError::EmptyTable("dangerous_tokens"));
        }
        Ok(())
    }
}
