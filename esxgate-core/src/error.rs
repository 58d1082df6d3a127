//! Error taxonomy for the gateway core
//!
//! Every failure crossing the system boundary is one of these kinds. The
//! messages are short and categorical: no transport diagnostics, no echoed
//! command fragments, no credentials.

use thiserror::Error;

use crate::policy::ValidationReason;
use crate::transport::TransportError;

/// Failures while establishing an authenticated session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The secure-shell client capability is missing
    #[error("Secure-shell transport is not available")]
    TransportUnavailable,

    /// The remote host could not be reached
    #[error("Host is not reachable")]
    Unreachable,

    /// The remote host rejected the credentials
    #[error("Authentication failed")]
    AuthFailed,

    /// The configured connection cap is reached
    #[error("Connection limit reached")]
    CapacityExhausted,
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable(_) => Self::TransportUnavailable,
            TransportError::Unreachable(_) | TransportError::Stream(_) => Self::Unreachable,
            TransportError::AuthFailed => Self::AuthFailed,
        }
    }
}

/// Failures while executing a command on an established session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// No session with the given id exists
    #[error("Session not found")]
    SessionNotFound,

    /// The session sat idle past its timeout and has been torn down
    #[error("Session expired")]
    SessionExpired,

    /// The policy engine denied the command
    #[error("Command rejected: {0}")]
    Rejected(ValidationReason),

    /// The command ran past the execution timeout and was aborted
    #[error("Command execution timed out")]
    Timeout,

    /// The command stream broke before completion
    #[error("Command stream failed")]
    StreamFailure,
}

/// Failures while disconnecting a session.
///
/// Non-fatal: the session is removed from the store regardless.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisconnectError {
    /// The transport close handshake failed
    #[error("Failed to close transport")]
    TransportCloseFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_connection_kinds() {
        assert_eq!(
            ConnectionError::from(TransportError::Unavailable("no ssh".into())),
            ConnectionError::TransportUnavailable
        );
        assert_eq!(
            ConnectionError::from(TransportError::Unreachable("esx01".into())),
            ConnectionError::Unreachable
        );
        assert_eq!(
            ConnectionError::from(TransportError::AuthFailed),
            ConnectionError::AuthFailed
        );
    }

    #[test]
    fn messages_leak_no_internals() {
        // Unreachable carries a hostname at the transport layer; the public
        // kind drops it
        let err = ConnectionError::from(TransportError::Unreachable("esx01.internal".into()));
        assert!(!err.to_string().contains("esx01"));
    }

    #[test]
    fn rejection_message_names_the_rule_not_the_command() {
        let err = ExecutionError::Rejected(ValidationReason::DangerousPattern);
        assert_eq!(
            err.to_string(),
            "Command rejected: Command contains dangerous patterns"
        );
    }
}
