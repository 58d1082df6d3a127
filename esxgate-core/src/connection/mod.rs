//! Connection lifecycle management
//!
//! This module owns the authenticated transports and drives the per-session
//! state machine that gates every remote execution.

mod manager;

pub use manager::{ConnectionManager, ConnectionState};
