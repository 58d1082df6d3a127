//! JSON request/response contract
//!
//! The dispatcher (whatever hosts the gateway: CLI, HTTP front end) speaks
//! this shape. Requests only deserialize: the credential field is a
//! [`SecretString`] and must never be written back out. Responses carry a
//! success flag and a short categorical message; error responses never
//! include transport diagnostics or fragments of a rejected command.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while checking a request's fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// A field required for this request kind is missing
    #[error("Missing required parameter: {0}")]
    MissingField(&'static str),

    /// The host field contains characters outside `[a-zA-Z0-9.-]`
    #[error("Host contains invalid characters")]
    InvalidHost,

    /// The username field contains characters outside `[a-zA-Z0-9_-]`
    #[error("Username contains invalid characters")]
    InvalidUsername,
}

/// Requested session action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    /// Terminate the session named by `session_id`
    Disconnect,
}

/// One inbound gateway request
#[derive(Debug, Deserialize)]
pub struct GatewayRequest {
    /// Hostname or IP; required when opening a new session
    pub host: Option<String>,
    /// Username; required when opening a new session
    pub username: Option<String>,
    /// Opaque credential; required when opening a new session
    pub password: Option<SecretString>,
    /// Command to run; required unless `action` is `disconnect`
    pub command: Option<String>,
    /// Reuse an existing session
    pub session_id: Option<Uuid>,
    /// Requested idle timeout in seconds, clamped server-side to `[10, 300]`
    pub timeout: Option<i64>,
    /// Optional session action
    pub action: Option<RequestAction>,
}

impl GatewayRequest {
    /// Returns true if this request asks for a disconnect
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        self.action == Some(RequestAction::Disconnect)
    }

    /// Checks field presence and charset constraints for this request kind.
    ///
    /// A disconnect needs only `session_id`; an execute on an existing
    /// session needs `session_id` and `command`; a new session needs
    /// `host`, `username`, `password`, and `command`.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn check(&self) -> Result<(), RequestError> {
        if self.is_disconnect() {
            if self.session_id.is_none() {
                return Err(RequestError::MissingField("session_id"));
            }
            return Ok(());
        }

        if self.command.is_none() {
            return Err(RequestError::MissingField("command"));
        }

        if self.session_id.is_some() {
            return Ok(());
        }

        let host = self
            .host
            .as_deref()
            .ok_or(RequestError::MissingField("host"))?;
        let username = self
            .username
            .as_deref()
            .ok_or(RequestError::MissingField("username"))?;
        if self.password.is_none() {
            return Err(RequestError::MissingField("password"));
        }

        if !is_valid_host(host) {
            return Err(RequestError::InvalidHost);
        }
        if !is_valid_username(username) {
            return Err(RequestError::InvalidUsername);
        }

        Ok(())
    }
}

/// Returns true if the string is a plausible hostname/IP: nonempty,
/// charset `[a-zA-Z0-9.-]`
#[must_use]
pub fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
}

/// Returns true if the string is a plausible username: nonempty,
/// charset `[a-zA-Z0-9_-]`
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

/// One outbound gateway response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Whether the request succeeded
    pub success: bool,
    /// Short human-readable description of the outcome
    pub message: String,
    /// Command output; absent for disconnects and failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Session id for reuse in subsequent requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl GatewayResponse {
    /// Creates a success response
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output: None,
            session_id: None,
        }
    }

    /// Creates a failure response
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output: None,
            session_id: None,
        }
    }

    /// Attaches command output
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Attaches the session id
    #[must_use]
    pub const fn with_session_id(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }
}
