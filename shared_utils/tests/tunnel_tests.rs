use shared_utils::config::CoreConfig;
use shared_utils::keychain::{CredentialAdapter, MemorySecretStore, SecretStore};
use shared_utils::tunnel::{
    BundleId, CommandTunnel, Credentials, LifecycleEvent, ProvisioningCall, ProvisioningError, SimulatedTunnel,
    TunnelConfiguration, TunnelControl, TunnelController, TunnelError, TunnelExtra,
    TunnelIdentity, TunnelProtocol, TunnelStatus,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const BUNDLE: &str = "com.example.tunnel";

fn test_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.lifecycle.simulated_delay_ms = 200;
    config
}

fn identity() -> TunnelIdentity {
    TunnelIdentity::new(
        BUNDLE,
        TunnelConfiguration::new("Office", TunnelProtocol::WireGuard).with_setting("mtu", "1420"),
    )
    .with_extra(TunnelExtra {
        kill_switch: true,
        ..Default::default()
    })
}

fn drain(rx: &mut UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[LifecycleEvent]) -> Vec<TunnelStatus> {
    events.iter().filter_map(LifecycleEvent::status).collect()
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_status_order() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();

    tunnel.install(identity()).await.unwrap();
    assert_eq!(
        statuses(&drain(&mut rx)),
        vec![TunnelStatus::Disconnected]
    );

    // no disconnecting phase when starting from disconnected
    tunnel.reconnect(Duration::from_millis(100)).await.unwrap();
    assert_eq!(
        statuses(&drain(&mut rx)),
        vec![TunnelStatus::Connecting, TunnelStatus::Connected]
    );

    tunnel.disconnect().await.unwrap();
    assert_eq!(
        statuses(&drain(&mut rx)),
        vec![TunnelStatus::Disconnecting, TunnelStatus::Disconnected]
    );
    assert!(!tunnel.is_enabled());
    assert_eq!(tunnel.identity(), Some(identity()));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_from_connected_tears_down_first() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();

    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();
    let started = tokio::time::Instant::now();
    tunnel.reconnect(Duration::from_millis(500)).await.unwrap();

    assert_eq!(
        statuses(&drain(&mut rx)),
        vec![
            TunnelStatus::Disconnecting,
            TunnelStatus::Connecting,
            TunnelStatus::Connected
        ]
    );
    // stop + delay + start
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(
        tunnel.provisioning().calls(),
        vec![
            ProvisioningCall::Register(BundleId::from(BUNDLE)),
            ProvisioningCall::Start,
            ProvisioningCall::Stop,
            ProvisioningCall::Start,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_calls_rejected_as_busy() {
    let tunnel = Arc::new(SimulatedTunnel::simulated(&test_config()));
    tunnel.install(identity()).await.unwrap();
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();

    let in_flight = {
        let tunnel = tunnel.clone();
        tokio::spawn(async move { tunnel.reconnect(Duration::from_millis(50)).await })
    };
    let first = rx.recv().await.unwrap();
    assert_eq!(first.status(), Some(TunnelStatus::Connecting));

    for _ in 0..3 {
        assert_eq!(
            tunnel.reconnect(Duration::ZERO).await,
            Err(TunnelError::Busy)
        );
    }
    assert_eq!(
        tunnel.reconnect_with(identity(), Duration::ZERO).await,
        Err(TunnelError::Busy)
    );
    assert_eq!(tunnel.disconnect().await, Err(TunnelError::Busy));
    assert_eq!(tunnel.install(identity()).await, Err(TunnelError::Busy));

    in_flight.await.unwrap().unwrap();
    assert_eq!(
        statuses(&drain(&mut rx)),
        vec![TunnelStatus::Connected]
    );
    assert_eq!(tunnel.status(), TunnelStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_twice_is_idempotent() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();

    tunnel.disconnect().await.unwrap();
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();
    tunnel.disconnect().await.unwrap();

    assert!(drain(&mut rx).is_empty());
    assert_eq!(tunnel.status(), TunnelStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_publishes_failed_then_disconnected() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    tunnel.install(identity()).await.unwrap();
    tunnel.provisioning().fail_start(Some("no route"));
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();

    let err = tunnel.reconnect(Duration::ZERO).await.unwrap_err();
    let expected = TunnelError::Provisioning(ProvisioningError::StartFailed("no route".to_string()));
    assert_eq!(err, expected);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].status(), Some(TunnelStatus::Connecting));
    assert_eq!(events[1], LifecycleEvent::Failed { error: expected });
    assert_eq!(events[2].status(), Some(TunnelStatus::Disconnected));
    assert_eq!(tunnel.status(), TunnelStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_with_new_identity() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();

    let replacement = TunnelIdentity::new(
        "com.example.other",
        TunnelConfiguration::new("Home", TunnelProtocol::OpenVpn),
    );
    tunnel
        .reconnect_with(replacement.clone(), Duration::from_millis(10))
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        events[0],
        LifecycleEvent::Reinstalled {
            bundle_id: Some(BundleId::from("com.example.other")),
            enabled: true
        }
    );
    assert_eq!(
        statuses(&events),
        vec![
            TunnelStatus::Disconnecting,
            TunnelStatus::Connecting,
            TunnelStatus::Connected
        ]
    );
    assert_eq!(tunnel.identity(), Some(replacement));
    assert_eq!(
        tunnel.provisioning().registered(),
        Some(BundleId::from("com.example.other"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_uninstall_swallows_removal_failure() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();
    tunnel.provisioning().fail_remove(Some("permission denied"));
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();

    tunnel.uninstall().await;

    assert_eq!(
        drain(&mut rx),
        vec![LifecycleEvent::StatusChanged {
            bundle_id: Some(BundleId::from(BUNDLE)),
            enabled: false,
            status: TunnelStatus::Disconnected,
        }]
    );
    assert_eq!(tunnel.status(), TunnelStatus::Disconnected);
    assert!(tunnel.identity().is_none());
    assert!(!tunnel.is_enabled());
    assert_eq!(
        tunnel.reconnect(Duration::ZERO).await,
        Err(TunnelError::NotInstalled)
    );
}

#[tokio::test(start_paused = true)]
async fn test_credentials_stored_before_registration() {
    let store: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
    let config = test_config();
    let tunnel = TunnelController::from_config(
        shared_utils::tunnel::SimulatedProvisioning::new(config.lifecycle.simulated_delay()),
        &config,
    )
    .with_credentials(CredentialAdapter::from_config(store, &config));

    let configured = TunnelIdentity::new(
        BUNDLE,
        TunnelConfiguration::new("Office", TunnelProtocol::OpenVpn)
            .with_credentials(Credentials::new("alice", "s3cret")),
    );
    tunnel.install(configured.clone()).await.unwrap();
    let first = tunnel.identity().unwrap().extra.unwrap().password_reference;

    // same password again keeps the same reference
    tunnel
        .reconnect_with(configured, Duration::ZERO)
        .await
        .unwrap();
    let second = tunnel.identity().unwrap().extra.unwrap().password_reference;

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_credential_store_failure_fails_install() {
    let backend = Arc::new(MemorySecretStore::new());
    backend.set_fail_adds(true);
    let store: Arc<dyn SecretStore> = backend;
    let tunnel = SimulatedTunnel::simulated(&test_config())
        .with_credentials(CredentialAdapter::new(store, None));
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();

    let configured = TunnelIdentity::new(
        BUNDLE,
        TunnelConfiguration::new("Office", TunnelProtocol::OpenVpn)
            .with_credentials(Credentials::new("alice", "s3cret")),
    );
    let err = tunnel.install(configured).await.unwrap_err();

    assert!(matches!(err, TunnelError::Credential(_)));
    let events = drain(&mut rx);
    assert!(matches!(events[0], LifecycleEvent::Failed { .. }));
    assert_eq!(events[1].status(), Some(TunnelStatus::Disconnected));
    assert!(tunnel.identity().is_none());
    assert!(tunnel.provisioning().calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_callbacks_observe_every_event() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let seen = seen.clone();
        tunnel.subscribe(move |event| seen.lock().unwrap().push(event.clone()))
    };

    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();
    tunnel.uninstall().await;

    let seen = seen.lock().unwrap();
    assert!(matches!(seen[0], LifecycleEvent::Reinstalled { enabled: true, .. }));
    assert_eq!(
        statuses(&seen),
        vec![
            TunnelStatus::Disconnected,
            TunnelStatus::Connecting,
            TunnelStatus::Connected,
            TunnelStatus::Disconnected
        ]
    );
}

#[tokio::test]
async fn test_command_tunnel_runs_configured_commands() {
    let mut config = CoreConfig::default();
    config.provisioning.start_command = Some("test -n {bundle_id}".to_string());
    config.provisioning.stop_command = Some("true".to_string());
    config.provisioning.stats_command = Some("printf 'rx_bytes=3\\ntx_bytes=4\\n'".to_string());
    let tunnel = CommandTunnel::with_commands(&config);

    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();
    assert_eq!(tunnel.status(), TunnelStatus::Connected);
    assert_eq!(
        tunnel.data_count().await,
        Some(shared_utils::stats::DataCount::new(3, 4))
    );

    tunnel.disconnect().await.unwrap();
    tunnel.uninstall().await;
    assert!(tunnel.provisioning().registered().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_registration_removes_new_secret() {
    let backend = MemorySecretStore::new();
    let store: Arc<dyn SecretStore> = Arc::new(backend.clone());
    let tunnel = SimulatedTunnel::simulated(&test_config())
        .with_credentials(CredentialAdapter::new(store, None));
    tunnel.provisioning().fail_register(Some("denied"));

    let configured = TunnelIdentity::new(
        BUNDLE,
        TunnelConfiguration::new("Office", TunnelProtocol::OpenVpn)
            .with_credentials(Credentials::new("alice", "s3cret")),
    );
    let err = tunnel.install(configured).await.unwrap_err();

    assert_eq!(
        err,
        TunnelError::Provisioning(ProvisioningError::RegistrationFailed("denied".to_string()))
    );
    assert!(tunnel.identity().is_none());
    assert!(backend.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_registration_keeps_reused_secret() {
    let backend = MemorySecretStore::new();
    let store: Arc<dyn SecretStore> = Arc::new(backend.clone());
    let adapter = CredentialAdapter::new(store, None);
    adapter.store("s3cret", "alice", BUNDLE).unwrap();
    let tunnel = SimulatedTunnel::simulated(&test_config()).with_credentials(adapter);
    tunnel.provisioning().fail_register(Some("denied"));

    let configured = TunnelIdentity::new(
        BUNDLE,
        TunnelConfiguration::new("Office", TunnelProtocol::OpenVpn)
            .with_credentials(Credentials::new("alice", "s3cret")),
    );
    assert!(tunnel.install(configured).await.is_err());

    assert_eq!(backend.len(), 1);
    assert_eq!(
        tunnel.credentials().unwrap().lookup("alice", BUNDLE).unwrap(),
        "s3cret"
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_with_registration_failure_stops_running_tunnel() {
    let tunnel = SimulatedTunnel::simulated(&test_config());
    tunnel.install(identity()).await.unwrap();
    tunnel.reconnect(Duration::ZERO).await.unwrap();
    assert_eq!(tunnel.status(), TunnelStatus::Connected);

    tunnel.provisioning().fail_register(Some("denied"));
    let (_sub, mut rx) = tunnel.notifications().subscribe_channel();
    let replacement = TunnelIdentity::new(
        "com.example.other",
        TunnelConfiguration::new("Home", TunnelProtocol::OpenVpn),
    );

    let expected =
        TunnelError::Provisioning(ProvisioningError::RegistrationFailed("denied".to_string()));
    assert_eq!(
        tunnel.reconnect_with(replacement, Duration::ZERO).await,
        Err(expected.clone())
    );

    assert_eq!(
        drain(&mut rx),
        vec![
            LifecycleEvent::Failed { error: expected },
            LifecycleEvent::StatusChanged {
                bundle_id: Some(BundleId::from(BUNDLE)),
                enabled: true,
                status: TunnelStatus::Disconnected,
            },
        ]
    );
    let calls = tunnel.provisioning().calls();
    assert_eq!(
        calls[calls.len() - 2..],
        [
            ProvisioningCall::Register(BundleId::from("com.example.other")),
            ProvisioningCall::Stop,
        ]
    );
    assert!(!tunnel.provisioning().is_running());
    assert_eq!(tunnel.identity(), Some(identity()));
}
