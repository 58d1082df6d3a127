//! Session tracking for authenticated transports
//!
//! This module provides the [`SessionStore`], the sole source of truth for
//! which sessions are live, with TTL-based idle expiry.

mod store;

pub use store::{
    DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, Session, SessionId, SessionStore,
    clamp_timeout_secs,
};
