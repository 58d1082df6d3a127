//! Transport seam between the gateway core and the secure-shell client
//!
//! The gateway never talks to the wire directly; it consumes a
//! [`Transport`] produced by a [`TransportFactory`]. The production
//! implementation drives the system OpenSSH client ([`ssh`]); tests use the
//! in-crate [`scripted`] double. Timeout enforcement lives in the
//! connection manager, not here.

pub mod scripted;
pub mod ssh;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use scripted::{ScriptedFactory, ScriptedTransport};
pub use ssh::{SshCliFactory, SshCliTransport};

/// Transport-level failures, converted into the public error taxonomy by
/// the connection manager
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The secure-shell client capability is missing on this host
    #[error("Secure-shell client is not available: {0}")]
    Unavailable(String),

    /// The remote host could not be reached
    #[error("Host '{0}' is not reachable")]
    Unreachable(String),

    /// The remote host rejected the credentials
    #[error("Authentication failed")]
    AuthFailed,

    /// The command stream broke before the remote side signalled completion
    #[error("Command stream failed: {0}")]
    Stream(String),
}

/// Output accumulated from one remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Remote exit code, if the remote side reported one
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Returns true if the remote command exited zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A live authenticated channel to one remote host.
///
/// Owned exclusively by the session it was created for; never shared.
#[async_trait]
pub trait Transport: Send {
    /// Dispatches one command and accumulates its output until the remote
    /// side signals completion.
    ///
    /// # Errors
    /// Returns `TransportError::Stream` if the channel breaks mid-command.
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Sends a graceful termination signal and releases the channel.
    ///
    /// # Errors
    /// Returns an error if the close handshake fails; the caller still
    /// drops the handle.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Produces authenticated transports.
///
/// Every connect attempt gets its own fresh transport; failed attempts are
/// never reused.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Establishes and authenticates a transport to `host` as `username`.
    ///
    /// `connect_timeout` bounds the establishment phase; the factory should
    /// give up on its own within it, the caller enforces it regardless.
    ///
    /// # Errors
    /// * `TransportError::Unavailable` if the client capability is missing
    /// * `TransportError::Unreachable` if the host cannot be reached
    /// * `TransportError::AuthFailed` if the credentials are rejected
    async fn connect(
        &self,
        host: &str,
        username: &str,
        credential: &SecretString,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError>;
}
