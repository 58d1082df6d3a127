//! CLI error types and exit codes.

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, request parsing, or IO
    pub const GENERAL_ERROR: i32 = 1;
    /// Gateway failure - the command was refused by the policy engine
    pub const GATEWAY_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Policy table error
    #[error("Policy error: {0}")]
    Policy(String),

    /// Command refused by the policy engine
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// Async runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, policy tables, runtime, IO)
    /// - 2: Gateway failure (command rejected by policy)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Rejected(_) => exit_codes::GATEWAY_FAILURE,
            Self::Config(_) | Self::Policy(_) | Self::Runtime(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}
