//! End-to-end lifecycle tests over the scripted transport
//!
//! Exercises the full dispatcher-facing surface: connect, execute,
//! idle expiry, disconnect, and the concurrency guarantees around them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio::sync::Mutex;

use esxgate_core::transport::{ScriptedFactory, TransportError};
use esxgate_core::{
    CommandOutput, ConnectionError, ConnectionManager, ConnectionState, ExecutionError,
    GatewayConfig, PolicyEngine, SessionId, SessionStore, ValidationReason,
};

fn password(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn gateway(factory: ScriptedFactory) -> (Arc<ConnectionManager>, Arc<Mutex<SessionStore>>) {
    let store = Arc::new(Mutex::new(SessionStore::new()));
    let manager = ConnectionManager::new(
        GatewayConfig::default(),
        PolicyEngine::builtin(),
        Arc::clone(&store),
        Arc::new(factory),
    );
    (Arc::new(manager), store)
}

async fn backdate(store: &Arc<Mutex<SessionStore>>, id: SessionId, secs: u64) {
    let mut store = store.lock().await;
    let session = store.get_mut(id).expect("session exists");
    session.last_used_at = Instant::now() - Duration::from_secs(secs);
}

#[tokio::test]
async fn connect_execute_disconnect_round_trip() {
    let factory = ScriptedFactory::accepting().with_response(
        "esxcli system version get",
        CommandOutput {
            stdout: "Product: VMware ESXi\nVersion: 8.0.3\n".into(),
            stderr: String::new(),
            exit_code: Some(0),
        },
    );
    let (manager, store) = gateway(factory.clone());

    let id = manager
        .connect("esx01.lab.local", "root", &password("pw"), 30)
        .await
        .expect("connect");
    assert_eq!(manager.state(id).await, ConnectionState::Connected);

    let output = manager
        .execute(id, "esxcli system version get")
        .await
        .expect("execute");
    assert!(output.stdout.contains("VMware ESXi"));

    manager.disconnect(id).await.expect("disconnect");
    assert_eq!(manager.state(id).await, ConnectionState::Disconnected);
    assert!(store.lock().await.is_empty());
    assert_eq!(factory.transports_closed(), 1);
}

#[tokio::test]
async fn clamped_timeout_then_expiry_round_trip() {
    // Requested timeout 5 clamps to 10; after 11 idle seconds the session
    // is purged and a subsequent execute reports expiry
    let (manager, store) = gateway(ScriptedFactory::accepting());

    let id = manager
        .connect("esx01", "root", &password("pw"), 5)
        .await
        .expect("connect");
    assert_eq!(store.lock().await.get(id).expect("session").timeout_secs, 10);

    manager.execute(id, "uptime").await.expect("execute");

    backdate(&store, id, 11).await;
    let purged = manager.sweep_expired().await;
    assert_eq!(purged, vec![id]);

    let result = manager.execute(id, "uptime").await;
    assert_eq!(result, Err(ExecutionError::SessionExpired));
}

#[tokio::test]
async fn wrong_password_yields_auth_failed() {
    let (manager, store) =
        gateway(ScriptedFactory::accepting().with_expected_password("right"));

    let result = manager
        .connect("esx01", "root", &password("wrong"), 30)
        .await;
    assert_eq!(result, Err(ConnectionError::AuthFailed));
    assert!(store.lock().await.is_empty());

    let id = manager
        .connect("esx01", "root", &password("right"), 30)
        .await
        .expect("connect");
    assert!(store.lock().await.contains(id));
}

#[tokio::test]
async fn rejected_command_reaches_no_transport() {
    let factory = ScriptedFactory::accepting();
    let (manager, _) = gateway(factory.clone());

    let id = manager
        .connect("esx01", "root", &password("pw"), 30)
        .await
        .expect("connect");

    let result = manager.execute(id, "uptime; rm -rf /").await;
    assert_eq!(
        result,
        Err(ExecutionError::Rejected(ValidationReason::DangerousPattern))
    );
    // Only the connect-time transport exists and it never saw the command;
    // a clean follow-up still works
    let output = manager.execute(id, "uptime").await.expect("execute");
    assert_eq!(output.stdout, "uptime\n");
}

#[tokio::test]
async fn concurrent_executes_on_one_session_serialize() {
    let factory =
        ScriptedFactory::accepting().with_execute_delay(Duration::from_millis(50));
    let (manager, _) = gateway(factory);

    let id = manager
        .connect("esx01", "root", &password("pw"), 30)
        .await
        .expect("connect");

    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.execute(id, "uptime").await }
    });
    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.execute(id, "df -h").await }
    });

    let (a, b) = (a.await.expect("join"), b.await.expect("join"));
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn capacity_cap_applies_across_sessions() {
    let store = Arc::new(Mutex::new(SessionStore::new()));
    let manager = ConnectionManager::new(
        GatewayConfig::default().with_max_connections(2),
        PolicyEngine::builtin(),
        Arc::clone(&store),
        Arc::new(ScriptedFactory::accepting()),
    );

    let first = manager
        .connect("esx01", "root", &password("pw"), 30)
        .await
        .expect("first");
    let _second = manager
        .connect("esx02", "root", &password("pw"), 30)
        .await
        .expect("second");

    assert_eq!(
        manager.connect("esx03", "root", &password("pw"), 30).await,
        Err(ConnectionError::CapacityExhausted)
    );

    // Expiring a session frees its slot
    backdate(&store, first, 31).await;
    manager.sweep_expired().await;
    assert!(manager.connect("esx03", "root", &password("pw"), 30).await.is_ok());
}

#[tokio::test]
async fn expiry_tears_down_transport_without_explicit_disconnect() {
    let factory = ScriptedFactory::accepting();
    let (manager, store) = gateway(factory.clone());

    let id = manager
        .connect("esx01", "root", &password("pw"), 10)
        .await
        .expect("connect");
    backdate(&store, id, 11).await;

    // No caller ever disconnects; the sweep forces the teardown
    manager.sweep_expired().await;
    assert_eq!(factory.transports_closed(), 1);
    assert_eq!(manager.active_connections().await, 0);
}

#[tokio::test]
async fn disconnect_twice_and_unknown_are_no_ops() {
    let (manager, _) = gateway(ScriptedFactory::accepting());

    let id = manager
        .connect("esx01", "root", &password("pw"), 30)
        .await
        .expect("connect");
    assert!(manager.disconnect(id).await.is_ok());
    assert!(manager.disconnect(id).await.is_ok());
    assert!(manager.disconnect(uuid::Uuid::new_v4()).await.is_ok());
}

#[tokio::test]
async fn transport_unavailable_maps_cleanly() {
    let (manager, _) = gateway(
        ScriptedFactory::accepting()
            .with_connect_error(TransportError::Unavailable("no client".into())),
    );
    assert_eq!(
        manager.connect("esx01", "root", &password("pw"), 30).await,
        Err(ConnectionError::TransportUnavailable)
    );
}
