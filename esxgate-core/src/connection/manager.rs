//! Connection manager: the session/connection lifecycle state machine
//!
//! Per session: `Disconnected → Connecting → Authenticating → Connected ⇄
//! Executing → … → Disconnected`, with `Connected/Executing → Expired →
//! Disconnected` on idle timeout and `Connecting/Authenticating →
//! Disconnected` on failure.
//!
//! Invariants enforced here:
//! - every connect attempt gets its own fresh transport;
//! - at most one in-flight operation per session id (per-session lock);
//! - a session absent from the store is never acted on, and a session
//!   without a live transport is purged;
//! - total concurrently held connections are capped;
//! - connect and execute are bounded by independent timeouts, both clamped
//!   to the same `[10, 300]` second range as the idle timeout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::config::GatewayConfig;
use crate::error::{ConnectionError, DisconnectError, ExecutionError};
use crate::policy::PolicyEngine;
use crate::session::{SessionId, SessionStore};
use crate::transport::{CommandOutput, Transport, TransportFactory};

/// Cap on remembered expired-session ids. When reached the set is cleared;
/// an execute against a very old expired id then reports not-found instead
/// of expired, which only affects error precision.
const EXPIRED_TOMBSTONE_CAP: usize = 1024;

/// Lifecycle state of one session's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport exists for this session id
    Disconnected,
    /// Transport establishment is in progress
    Connecting,
    /// Credentials are being presented
    Authenticating,
    /// Transport is live and idle
    Connected,
    /// A command is in flight on the transport
    Executing,
    /// Idle timeout fired; teardown is in progress
    Expired,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Executing => "executing",
            Self::Expired => "expired",
        };
        write!(f, "{label}")
    }
}

impl ConnectionState {
    /// Returns true if a live transport backs this state
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Connected | Self::Executing)
    }
}

/// One session's exclusively owned transport plus its lifecycle state.
///
/// The permit ties the entry's lifetime to the global connection cap.
struct Entry {
    transport: Box<dyn Transport>,
    state: ConnectionState,
    _permit: OwnedSemaphorePermit,
}

type SharedEntry = Arc<Mutex<Entry>>;

/// Owns all live transports and drives connect/execute/disconnect.
///
/// The session store is injected so the calling layer controls its
/// lifetime; the manager never consults any ambient state.
pub struct ConnectionManager {
    config: GatewayConfig,
    policy: Arc<PolicyEngine>,
    store: Arc<Mutex<SessionStore>>,
    entries: Mutex<HashMap<SessionId, SharedEntry>>,
    expired: Mutex<HashSet<SessionId>>,
    factory: Arc<dyn TransportFactory>,
    limiter: Arc<Semaphore>,
}

impl ConnectionManager {
    /// Creates a manager over the given store, policy, and transport factory.
    ///
    /// The configuration is normalized first, so out-of-range timeouts are
    /// clamped before use.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        policy: PolicyEngine,
        store: Arc<Mutex<SessionStore>>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let config = config.normalized();
        let limiter = Arc::new(Semaphore::new(config.max_connections));

        Self {
            config,
            policy: Arc::new(policy),
            store,
            entries: Mutex::new(HashMap::new()),
            expired: Mutex::new(HashSet::new()),
            factory,
            limiter,
        }
    }

    /// Returns the policy engine this manager validates against
    #[must_use]
    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Establishes a transport, authenticates, and creates the session.
    ///
    /// The requested idle timeout is clamped to `[10, 300]` seconds. Every
    /// attempt uses a fresh transport; a failed attempt leaves nothing
    /// behind.
    ///
    /// # Errors
    /// * `ConnectionError::CapacityExhausted` if the connection cap is reached
    /// * `ConnectionError::TransportUnavailable` if the client capability is missing
    /// * `ConnectionError::Unreachable` if the host cannot be reached in time
    /// * `ConnectionError::AuthFailed` if the credentials are rejected
    pub async fn connect(
        &self,
        host: &str,
        username: &str,
        credential: &SecretString,
        timeout_secs: i64,
    ) -> Result<SessionId, ConnectionError> {
        let permit = Arc::clone(&self.limiter)
            .try_acquire_owned()
            .map_err(|_| ConnectionError::CapacityExhausted)?;

        let connect_timeout = self.config.connect_timeout();
        tracing::debug!(host, username, state = %ConnectionState::Connecting, "establishing transport");

        // The factory covers both the connecting and authenticating phases;
        // the outer timeout bounds them together so a stalled remote end
        // cannot hold the caller.
        let transport = timeout(
            connect_timeout,
            self.factory
                .connect(host, username, credential, connect_timeout),
        )
        .await
        .map_err(|_| {
            tracing::warn!(host, "connect timed out");
            ConnectionError::Unreachable
        })?
        .map_err(|e| {
            tracing::warn!(host, state = %ConnectionState::Disconnected, "connect failed");
            ConnectionError::from(e)
        })?;

        let id = self
            .store
            .lock()
            .await
            .create(host, username, timeout_secs);

        self.entries.lock().await.insert(
            id,
            Arc::new(Mutex::new(Entry {
                transport,
                state: ConnectionState::Connected,
                _permit: permit,
            })),
        );

        tracing::info!(session = %id, host, state = %ConnectionState::Connected, "session established");
        Ok(id)
    }

    /// Validates and executes one command on an established session.
    ///
    /// Sequence: sweep expired sessions; look up the session; check idle
    /// expiry; validate the command; touch the session; dispatch with a
    /// bounded execution timeout.
    ///
    /// # Errors
    /// * `ExecutionError::SessionNotFound` for unknown ids
    /// * `ExecutionError::SessionExpired` for idle-expired sessions
    /// * `ExecutionError::Rejected` when the policy engine denies the command
    /// * `ExecutionError::Timeout` when the execution timeout fires
    /// * `ExecutionError::StreamFailure` when the transport breaks mid-command
    pub async fn execute(
        &self,
        id: SessionId,
        command: &str,
    ) -> Result<CommandOutput, ExecutionError> {
        self.sweep_expired().await;

        enum Liveness {
            Missing,
            Expired,
            Live,
        }

        let liveness = {
            let store = self.store.lock().await;
            store.get(id).map_or(Liveness::Missing, |session| {
                if session.is_idle_expired() {
                    Liveness::Expired
                } else {
                    Liveness::Live
                }
            })
        };

        match liveness {
            Liveness::Missing => {
                if self.expired.lock().await.contains(&id) {
                    return Err(ExecutionError::SessionExpired);
                }
                return Err(ExecutionError::SessionNotFound);
            }
            Liveness::Expired => {
                // Raced past the sweep; tear down now
                self.store.lock().await.remove(id);
                self.remember_expired(id).await;
                self.drop_entry(id).await;
                return Err(ExecutionError::SessionExpired);
            }
            Liveness::Live => {}
        }

        let verdict = self.policy.validate(command);
        if !verdict.is_admitted() {
            tracing::warn!(session = %id, reason = %verdict.reason, "command rejected");
            return Err(ExecutionError::Rejected(verdict.reason));
        }

        self.store.lock().await.touch(id);

        let entry = self.entries.lock().await.get(&id).cloned();
        let Some(entry) = entry else {
            // A session without a live transport is invalid; purge it
            self.store.lock().await.remove(id);
            return Err(ExecutionError::SessionNotFound);
        };

        // Per-session lock: at most one in-flight command per transport
        let mut guard = entry.lock().await;
        guard.state = ConnectionState::Executing;
        tracing::debug!(session = %id, state = %ConnectionState::Executing, "dispatching command");

        let result = timeout(
            self.config.execution_timeout(),
            guard.transport.execute(command),
        )
        .await;
        guard.state = ConnectionState::Connected;
        drop(guard);

        match result {
            Err(_) => {
                tracing::warn!(session = %id, "execution timed out");
                Err(ExecutionError::Timeout)
            }
            Ok(Err(_)) => {
                tracing::warn!(session = %id, "command stream failed");
                Err(ExecutionError::StreamFailure)
            }
            Ok(Ok(output)) => {
                self.store.lock().await.touch(id);
                Ok(output)
            }
        }
    }

    /// Disconnects a session: graceful transport close, unconditional store
    /// removal.
    ///
    /// Idempotent: disconnecting an absent session is already-satisfied.
    ///
    /// # Errors
    /// Returns `DisconnectError::TransportCloseFailed` if the close
    /// handshake fails; the session is removed regardless.
    pub async fn disconnect(&self, id: SessionId) -> Result<(), DisconnectError> {
        let entry = self.entries.lock().await.remove(&id);
        let mut close_failed = false;

        if let Some(entry) = entry {
            let mut guard = entry.lock().await;
            if guard.transport.close().await.is_err() {
                tracing::warn!(session = %id, "transport close failed");
                close_failed = true;
            }
            guard.state = ConnectionState::Disconnected;
        }

        // Store removal proceeds no matter what the transport said
        self.store.lock().await.remove(id);
        tracing::info!(session = %id, state = %ConnectionState::Disconnected, "session disconnected");

        if close_failed {
            Err(DisconnectError::TransportCloseFailed)
        } else {
            Ok(())
        }
    }

    /// Purges idle-expired sessions and tears down their transports.
    ///
    /// Returns the purged session ids. Safe to call at any time; the
    /// manager also calls it before every execute.
    pub async fn sweep_expired(&self) -> Vec<SessionId> {
        let purged = self.store.lock().await.sweep_expired();

        for id in &purged {
            tracing::info!(session = %id, state = %ConnectionState::Expired, "session idle-expired");
            self.remember_expired(*id).await;
            self.drop_entry(*id).await;
        }

        purged
    }

    /// Reports the lifecycle state of a session id.
    ///
    /// A held per-session lock means an operation is in flight, which is
    /// reported as `Executing` rather than waiting for it to finish.
    pub async fn state(&self, id: SessionId) -> ConnectionState {
        let entry = self.entries.lock().await.get(&id).cloned();
        match entry {
            None => ConnectionState::Disconnected,
            Some(entry) => entry
                .try_lock()
                .map_or(ConnectionState::Executing, |guard| guard.state),
        }
    }

    /// Number of currently held connections
    pub async fn active_connections(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Remaining capacity under the connection cap
    #[must_use]
    pub fn available_capacity(&self) -> usize {
        self.limiter.available_permits()
    }

    async fn remember_expired(&self, id: SessionId) {
        let mut expired = self.expired.lock().await;
        if expired.len() >= EXPIRED_TOMBSTONE_CAP {
            expired.clear();
        }
        expired.insert(id);
    }

    /// Removes and closes a session's transport, releasing its permit
    async fn drop_entry(&self, id: SessionId) {
        let entry = self.entries.lock().await.remove(&id);
        if let Some(entry) = entry {
            let mut guard = entry.lock().await;
            let _ = guard.transport.close().await;
            guard.state = ConnectionState::Disconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedFactory, TransportError};
    use std::time::{Duration, Instant};

    fn password() -> SecretString {
        SecretString::from("secret".to_string())
    }

    fn manager_with(factory: ScriptedFactory) -> (ConnectionManager, Arc<Mutex<SessionStore>>) {
        let store = Arc::new(Mutex::new(SessionStore::new()));
        let manager = ConnectionManager::new(
            GatewayConfig::default(),
            PolicyEngine::builtin(),
            Arc::clone(&store),
            Arc::new(factory),
        );
        (manager, store)
    }

    async fn backdate(store: &Arc<Mutex<SessionStore>>, id: SessionId, secs: u64) {
        let mut store = store.lock().await;
        let session = store.get_mut(id).expect("session exists");
        session.last_used_at = Instant::now() - Duration::from_secs(secs);
    }

    #[tokio::test]
    async fn connect_creates_session_and_clamps_timeout() {
        let (manager, store) = manager_with(ScriptedFactory::accepting());

        let id = manager
            .connect("esx01", "root", &password(), 5)
            .await
            .expect("connect");

        let store = store.lock().await;
        let session = store.get(id).expect("session");
        assert_eq!(session.timeout_secs, 10);
        assert_eq!(session.host, "esx01");
    }

    #[tokio::test]
    async fn connect_maps_transport_errors() {
        let (manager, _) = manager_with(
            ScriptedFactory::accepting().with_connect_error(TransportError::AuthFailed),
        );
        let result = manager.connect("esx01", "root", &password(), 30).await;
        assert_eq!(result, Err(ConnectionError::AuthFailed));

        let (manager, store) = manager_with(
            ScriptedFactory::accepting()
                .with_connect_error(TransportError::Unreachable("esx01".into())),
        );
        let result = manager.connect("esx01", "root", &password(), 30).await;
        assert_eq!(result, Err(ConnectionError::Unreachable));
        assert!(store.lock().await.is_empty());
    }

    #[tokio::test]
    async fn each_connect_attempt_gets_a_fresh_transport() {
        let factory =
            ScriptedFactory::accepting().with_connect_error(TransportError::AuthFailed);
        let (manager, _) = manager_with(factory.clone());

        let _ = manager.connect("esx01", "root", &password(), 30).await;
        let _ = manager.connect("esx01", "root", &password(), 30).await;
        assert_eq!(factory.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn failed_connect_releases_capacity() {
        let factory =
            ScriptedFactory::accepting().with_connect_error(TransportError::AuthFailed);
        let store = Arc::new(Mutex::new(SessionStore::new()));
        let manager = ConnectionManager::new(
            GatewayConfig::default().with_max_connections(1),
            PolicyEngine::builtin(),
            store,
            Arc::new(factory),
        );

        let _ = manager.connect("esx01", "root", &password(), 30).await;
        assert_eq!(manager.available_capacity(), 1);
    }

    #[tokio::test]
    async fn connection_cap_rejects_excess_connects() {
        let store = Arc::new(Mutex::new(SessionStore::new()));
        let manager = ConnectionManager::new(
            GatewayConfig::default().with_max_connections(1),
            PolicyEngine::builtin(),
            store,
            Arc::new(ScriptedFactory::accepting()),
        );

        manager
            .connect("esx01", "root", &password(), 30)
            .await
            .expect("first connect");
        let result = manager.connect("esx02", "root", &password(), 30).await;
        assert_eq!(result, Err(ConnectionError::CapacityExhausted));
    }

    #[tokio::test]
    async fn disconnect_frees_capacity() {
        let store = Arc::new(Mutex::new(SessionStore::new()));
        let manager = ConnectionManager::new(
            GatewayConfig::default().with_max_connections(1),
            PolicyEngine::builtin(),
            store,
            Arc::new(ScriptedFactory::accepting()),
        );

        let id = manager
            .connect("esx01", "root", &password(), 30)
            .await
            .expect("connect");
        manager.disconnect(id).await.expect("disconnect");
        assert!(manager.connect("esx02", "root", &password(), 30).await.is_ok());
    }

    #[tokio::test]
    async fn execute_runs_admitted_command() {
        let (manager, _) = manager_with(ScriptedFactory::accepting());
        let id = manager
            .connect("esx01", "root", &password(), 30)
            .await
            .expect("connect");

        let output = manager.execute(id, "uptime").await.expect("execute");
        assert_eq!(output.stdout, "uptime\n");
        assert_eq!(manager.state(id).await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn execute_rejects_denied_command() {
        let (manager, _) = manager_with(ScriptedFactory::accepting());
        let id = manager
            .connect("esx01", "root", &password(), 30)
            .await
            .expect("connect");

        let result = manager.execute(id, "rm -rf /").await;
        assert!(matches!(result, Err(ExecutionError::Rejected(_))));
    }

    #[tokio::test]
    async fn execute_unknown_session_is_not_found() {
        let (manager, _) = manager_with(ScriptedFactory::accepting());
        let result = manager.execute(uuid::Uuid::new_v4(), "uptime").await;
        assert_eq!(result, Err(ExecutionError::SessionNotFound));
    }

    #[tokio::test]
    async fn execute_after_expiry_reports_expired() {
        let factory = ScriptedFactory::accepting();
        let (manager, store) = manager_with(factory.clone());
        let id = manager
            .connect("esx01", "root", &password(), 10)
            .await
            .expect("connect");

        backdate(&store, id, 11).await;
        let result = manager.execute(id, "uptime").await;
        assert_eq!(result, Err(ExecutionError::SessionExpired));
        // Transport was torn down with the session
        assert_eq!(factory.transports_closed(), 1);
        assert_eq!(manager.active_connections().await, 0);
    }

    #[tokio::test]
    async fn sweep_purges_expired_and_reports_ids() {
        let (manager, store) = manager_with(ScriptedFactory::accepting());
        let id = manager
            .connect("esx01", "root", &password(), 10)
            .await
            .expect("connect");

        backdate(&store, id, 11).await;
        let purged = manager.sweep_expired().await;
        assert_eq!(purged, vec![id]);
        assert!(store.lock().await.is_empty());
        assert_eq!(manager.state(id).await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (manager, _) = manager_with(ScriptedFactory::accepting());
        let id = manager
            .connect("esx01", "root", &password(), 30)
            .await
            .expect("connect");

        assert!(manager.disconnect(id).await.is_ok());
        assert!(manager.disconnect(id).await.is_ok());
        assert!(manager.disconnect(uuid::Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn execution_timeout_is_reported() {
        let factory =
            ScriptedFactory::accepting().with_execute_delay(Duration::from_secs(3600));
        let (manager, _) = manager_with(factory);
        let id = manager
            .connect("esx01", "root", &password(), 300)
            .await
            .expect("connect");

        let result = manager.execute(id, "uptime").await;
        assert_eq!(result, Err(ExecutionError::Timeout));
        // The session itself stays live; only the command was aborted
        assert_eq!(manager.state(id).await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn stream_failure_is_reported() {
        let factory = ScriptedFactory::accepting()
            .with_execute_error(TransportError::Stream("broken pipe".into()));
        let (manager, _) = manager_with(factory);
        let id = manager
            .connect("esx01", "root", &password(), 30)
            .await
            .expect("connect");

        let result = manager.execute(id, "uptime").await;
        assert_eq!(result, Err(ExecutionError::StreamFailure));
    }

    #[tokio::test]
    async fn execute_touches_session() {
        let (manager, store) = manager_with(ScriptedFactory::accepting());
        let id = manager
            .connect("esx01", "root", &password(), 10)
            .await
            .expect("connect");

        // Near expiry, one execute resets the idle clock
        backdate(&store, id, 9).await;
        manager.execute(id, "uptime").await.expect("execute");
        let store = store.lock().await;
        let session = store.get(id).expect("session");
        assert!(session.idle_remaining() > Duration::from_secs(8));
    }
}
