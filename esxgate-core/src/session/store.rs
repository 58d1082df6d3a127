//! Session store with TTL-based expiry
//!
//! Sessions are created only after successful authentication and removed on
//! explicit disconnect or idle expiry. The store performs no I/O; tearing
//! down the transport that belongs to an expired session is the connection
//! manager's job.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Opaque session identifier. UUID v4: unique and unguessable.
pub type SessionId = Uuid;

/// Lower clamp bound for session timeouts, seconds
pub const MIN_TIMEOUT_SECS: u64 = 10;

/// Upper clamp bound for session timeouts, seconds
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Timeout applied when a request does not specify one, seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Clamps a requested timeout to the permitted `[10, 300]` second range.
///
/// Accepts any integer; negative requests clamp to the minimum. Idempotent:
/// `clamp(clamp(x)) == clamp(x)`.
#[must_use]
pub fn clamp_timeout_secs(requested: i64) -> u64 {
    u64::try_from(requested).map_or(MIN_TIMEOUT_SECS, |secs| {
        secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
    })
}

/// A live authenticated session.
///
/// Exactly one session exists per authenticated transport. A session whose
/// idle timeout has elapsed is invalid and must be purged.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique, unguessable identifier
    pub id: SessionId,
    /// Remote host this session is authenticated to
    pub host: String,
    /// Username the session authenticated as
    pub username: String,
    /// Wall-clock time the session was established
    pub connected_at: DateTime<Utc>,
    /// Monotonic instant of the last use, drives idle expiry
    pub last_used_at: Instant,
    /// Idle timeout, already clamped to `[10, 300]`
    pub timeout_secs: u64,
}

impl Session {
    /// Creates a session for an authenticated transport.
    ///
    /// The requested timeout is clamped regardless of caller input.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>, timeout_secs: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            username: username.into(),
            connected_at: Utc::now(),
            last_used_at: Instant::now(),
            timeout_secs: clamp_timeout_secs(timeout_secs),
        }
    }

    /// Returns true if the session has sat idle past its timeout
    #[must_use]
    pub fn is_idle_expired(&self) -> bool {
        self.last_used_at.elapsed() > Duration::from_secs(self.timeout_secs)
    }

    /// Marks the session as used now
    pub fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    /// Remaining idle budget before this session expires
    #[must_use]
    pub fn idle_remaining(&self) -> Duration {
        Duration::from_secs(self.timeout_secs).saturating_sub(self.last_used_at.elapsed())
    }
}

/// Keyed table of active authenticated sessions.
///
/// The store is the only cross-request shared resource besides the live
/// transports themselves; callers wrap it in their own synchronization.
/// It is explicit and injectable, never ambient process-wide state.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
}

impl SessionStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session and returns its id.
    ///
    /// The timeout is clamped to `[10, 300]` seconds before storage.
    pub fn create(
        &mut self,
        host: impl Into<String>,
        username: impl Into<String>,
        timeout_secs: i64,
    ) -> SessionId {
        let session = Session::new(host, username, timeout_secs);
        let id = session.id;
        self.sessions.insert(id, session);
        id
    }

    /// Looks up a session by id
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Looks up a session by id, mutably
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Updates a session's last-used instant to now. No-op if absent.
    pub fn touch(&mut self, id: SessionId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.touch();
        }
    }

    /// Removes a session, returning it if present
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Removes every idle-expired session and returns the removed ids.
    ///
    /// Invoked opportunistically before processing any request.
    pub fn sweep_expired(&mut self) -> Vec<SessionId> {
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_idle_expired())
            .map(|s| s.id)
            .collect();

        for id in &expired {
            self.sessions.remove(id);
        }

        expired
    }

    /// Returns true if a session with the given id exists
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of tracked sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of all tracked sessions
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }
}
