//! `esxgate` Core Library
//!
//! This crate provides the core of the esxgate hypervisor diagnostic
//! command gateway: a narrow, auditable path for running a constrained set
//! of diagnostic commands on a remote hypervisor host over a secure-shell
//! transport. It is deliberately NOT a remote shell.
//!
//! # Crate Structure
//!
//! - [`policy`] - Command authorization engine and its policy tables
//! - [`session`] - Session store with TTL-based idle expiry
//! - [`connection`] - Connection manager and lifecycle state machine
//! - [`transport`] - Transport seam: system ssh client and test doubles
//! - [`config`] - Gateway settings (TOML)
//! - [`wire`] - JSON request/response contract for dispatchers
//! - [`error`] - Error taxonomy crossing the system boundary
//! - [`tracing`] - Structured logging setup

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod policy;
pub mod session;
pub mod tracing;
pub mod transport;
pub mod wire;

pub use config::{ConfigError, ConfigResult, GatewayConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ConnectionError, DisconnectError, ExecutionError};
pub use policy::{
    PolicyEngine, PolicyError, PolicyResult, PolicyTableError, PolicyTables, ValidationReason,
    ValidationResult,
};
pub use session::{
    DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, Session, SessionId, SessionStore,
    clamp_timeout_secs,
};
pub use transport::{
    CommandOutput, ScriptedFactory, ScriptedTransport, SshCliFactory, SshCliTransport, Transport,
    TransportError, TransportFactory,
};
pub use wire::{GatewayRequest, GatewayResponse, RequestAction, RequestError};
