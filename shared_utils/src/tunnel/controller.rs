//! Tunnel lifecycle controller.
//!
//! [`TunnelController`] owns the status and identity of one managed tunnel
//! and drives a [`ProvisioningService`] through install, reconnect,
//! disconnect and uninstall. Every transition is published on a
//! [`NotificationBus`].
//!
//! Only one lifecycle sequence runs at a time. `install`, `reconnect`,
//! `reconnect_with` and `disconnect` are rejected with
//! [`TunnelError::Busy`] while another sequence is in flight, without
//! publishing anything. `prepare` and `uninstall` wait their turn instead.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::CoreConfig;
use crate::keychain::{CredentialAdapter, SecretOptions, SecretStore};
use crate::logging::Masked;
use crate::stats::DataCount;
use crate::tunnel::command::CommandProvisioning;
use crate::tunnel::config::TunnelIdentity;
use crate::tunnel::error::{TunnelError, TunnelResult};
use crate::tunnel::notification::{LifecycleEvent, NotificationBus, Subscription};
use crate::tunnel::provisioning::{ProvisioningService, SimulatedProvisioning};
use crate::tunnel::types::{BundleId, TunnelStatus};

/// Credential adapter over a shared, type-erased secret store.
pub type SharedCredentials = CredentialAdapter<Arc<dyn SecretStore>>;

/// Controller driving the in-memory simulated provisioning service.
pub type SimulatedTunnel = TunnelController<SimulatedProvisioning>;

/// Controller driving configured external commands.
pub type CommandTunnel = TunnelController<CommandProvisioning>;

/// Lifecycle operations of a managed tunnel.
#[async_trait]
pub trait TunnelControl: Send + Sync {
    /// Adopt the status reported by the provisioning service if it diverges.
    ///
    /// Returns the status after synchronisation.
    async fn prepare(&self) -> TunnelStatus;

    /// Install `identity` and register it. Valid only while disconnected.
    async fn install(&self, identity: TunnelIdentity) -> TunnelResult<()>;

    /// Restart the tunnel with the current identity.
    ///
    /// When connected, the tunnel is torn down and `after` elapses before
    /// it is started again.
    async fn reconnect(&self, after: Duration) -> TunnelResult<()>;

    /// Replace the identity, register it, then restart like [`reconnect`](Self::reconnect).
    async fn reconnect_with(&self, identity: TunnelIdentity, after: Duration) -> TunnelResult<()>;

    /// Tear the tunnel down. A no-op while already disconnected.
    async fn disconnect(&self) -> TunnelResult<()>;

    /// Reset to disconnected, clear the identity and remove the profile.
    ///
    /// Never fails; removal errors are logged only.
    async fn uninstall(&self);

    /// Current status.
    fn status(&self) -> TunnelStatus;

    /// Installed identity, if any.
    fn identity(&self) -> Option<TunnelIdentity>;

    /// Whether the installed identity is active.
    fn is_enabled(&self) -> bool;

    /// Bus lifecycle events are published on.
    fn notifications(&self) -> &NotificationBus;

    /// Receive every lifecycle event published from now on.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
        Self: Sized,
    {
        self.notifications().subscribe(callback)
    }
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelSnapshot {
    pub bundle_id: Option<BundleId>,
    pub enabled: bool,
    pub status: TunnelStatus,
    /// Wall-clock time the tunnel last became connected, while it stays so
    pub connected_since: Option<SystemTime>,
}

#[derive(Debug, Default)]
struct ControllerState {
    identity: Option<TunnelIdentity>,
    enabled: bool,
    status: TunnelStatus,
    connected_since: Option<SystemTime>,
}

impl ControllerState {
    fn bundle_id(&self) -> Option<BundleId> {
        self.identity.as_ref().map(|identity| identity.bundle_id.clone())
    }

    fn set_status(&mut self, status: TunnelStatus) {
        if status == TunnelStatus::Connected {
            if self.status != TunnelStatus::Connected {
                self.connected_since = Some(SystemTime::now());
            }
        } else {
            self.connected_since = None;
        }
        self.status = status;
    }

    fn status_event(&self) -> LifecycleEvent {
        LifecycleEvent::StatusChanged {
            bundle_id: self.bundle_id(),
            enabled: self.enabled,
            status: self.status,
        }
    }
}

/// Lifecycle state machine for one managed tunnel.
pub struct TunnelController<P> {
    provisioning: P,
    state: Mutex<ControllerState>,
    sequence: AsyncMutex<()>,
    bus: NotificationBus,
    credentials: Option<SharedCredentials>,
    masks_private_data: bool,
}

impl<P: ProvisioningService> TunnelController<P> {
    /// Create a disconnected controller with its own notification bus.
    pub fn new(provisioning: P) -> Self {
        TunnelController {
            provisioning,
            state: Mutex::new(ControllerState::default()),
            sequence: AsyncMutex::new(()),
            bus: NotificationBus::new(),
            credentials: None,
            masks_private_data: true,
        }
    }

    /// Create a controller honouring the logging settings of `config`.
    pub fn from_config(provisioning: P, config: &CoreConfig) -> Self {
        TunnelController::new(provisioning).with_private_data_masking(config.masks_private_data)
    }

    /// Publish on `bus` instead of a private one.
    pub fn with_bus(mut self, bus: NotificationBus) -> Self {
        self.bus = bus;
        self
    }

    /// Store configuration passwords through `credentials` before registering.
    pub fn with_credentials(mut self, credentials: SharedCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Mask bundle identifiers in log output.
    pub fn with_private_data_masking(mut self, masks: bool) -> Self {
        self.masks_private_data = masks;
        self
    }

    /// The provisioning service being driven.
    pub fn provisioning(&self) -> &P {
        &self.provisioning
    }

    /// The credential adapter, if one is attached.
    pub fn credentials(&self) -> Option<&SharedCredentials> {
        self.credentials.as_ref()
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> TunnelSnapshot {
        let state = self.state();
        TunnelSnapshot {
            bundle_id: state.bundle_id(),
            enabled: state.enabled,
            status: state.status,
            connected_since: state.connected_since,
        }
    }

    /// When the tunnel became connected; `None` unless connected.
    pub fn connected_since(&self) -> Option<SystemTime> {
        self.state().connected_since
    }

    /// Traffic counters, only while connected.
    pub async fn data_count(&self) -> Option<DataCount> {
        if self.status() != TunnelStatus::Connected {
            return None;
        }
        self.provisioning.data_count().await
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, operation: &'static str) -> TunnelResult<AsyncMutexGuard<'_, ()>> {
        self.sequence.try_lock().map_err(|_| {
            debug!(operation, "Rejecting lifecycle operation, another one is in flight");
            TunnelError::Busy
        })
    }

    /// Move to `status` and publish the change.
    fn transition(&self, status: TunnelStatus) {
        let event = {
            let mut state = self.state();
            state.set_status(status);
            state.status_event()
        };
        info!(
            bundle_id = %Masked::new(&BundleLabel(event_bundle(&event)), self.masks_private_data),
            status = %status,
            "Tunnel status changed"
        );
        self.bus.publish(&event);
    }

    fn publish_reinstalled(&self) {
        let event = {
            let state = self.state();
            LifecycleEvent::Reinstalled {
                bundle_id: state.bundle_id(),
                enabled: state.enabled,
            }
        };
        self.bus.publish(&event);
    }

    /// Publish `Failed` then fall back to disconnected.
    fn fail(&self, err: TunnelError) -> TunnelError {
        error!(error = %err, "Lifecycle operation failed");
        self.bus.publish(&LifecycleEvent::Failed { error: err.clone() });
        self.transition(TunnelStatus::Disconnected);
        err
    }

    /// Store the configuration password and register `identity`.
    ///
    /// A password added for this registration is removed again if it fails.
    async fn register(&self, identity: &mut TunnelIdentity) -> TunnelResult<()> {
        let added = self.attach_credentials(identity)?;
        if let Err(e) = self.provisioning.register(identity).await {
            if added {
                self.discard_credentials(identity);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Returns `true` when a new secret entry was added.
    fn attach_credentials(&self, identity: &mut TunnelIdentity) -> TunnelResult<bool> {
        let (Some(adapter), Some(credentials)) =
            (&self.credentials, &identity.configuration.credentials)
        else {
            return Ok(false);
        };

        let stored = adapter.store_tracked(
            &credentials.password,
            &credentials.username,
            identity.bundle_id.as_str(),
            &SecretOptions::default(),
        )?;
        identity
            .extra
            .get_or_insert_with(Default::default)
            .password_reference = Some(stored.reference);
        Ok(stored.added)
    }

    fn discard_credentials(&self, identity: &TunnelIdentity) {
        let (Some(adapter), Some(credentials)) =
            (&self.credentials, &identity.configuration.credentials)
        else {
            return;
        };
        if !adapter.remove(&credentials.username, identity.bundle_id.as_str()) {
            warn!("Failed to remove secret stored for a rejected registration");
        }
    }

    /// Teardown (when connected) followed by start.
    async fn restart(&self, after: Duration) -> TunnelResult<()> {
        if self.status() == TunnelStatus::Connected {
            self.transition(TunnelStatus::Disconnecting);
            self.provisioning.stop().await;
            tokio::time::sleep(after).await;
        }

        self.transition(TunnelStatus::Connecting);
        match self.provisioning.start().await {
            Ok(()) => {
                self.transition(TunnelStatus::Connected);
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }
}

#[async_trait]
impl<P: ProvisioningService> TunnelControl for TunnelController<P> {
    async fn prepare(&self) -> TunnelStatus {
        let _sequence = self.sequence.lock().await;
        let Some(reported) = self.provisioning.reported_state().await else {
            return self.status();
        };

        let event = {
            let mut state = self.state();
            if state.status == reported.status && state.enabled == reported.enabled {
                None
            } else {
                debug!(
                    from = %state.status,
                    to = %reported.status,
                    "Adopting status reported by the provisioning service"
                );
                state.enabled = reported.enabled;
                state.set_status(reported.status);
                Some(state.status_event())
            }
        };

        if let Some(event) = event {
            self.bus.publish(&event);
        }
        reported.status
    }

    async fn install(&self, mut identity: TunnelIdentity) -> TunnelResult<()> {
        let _sequence = self.begin("install")?;
        let status = self.status();
        if status != TunnelStatus::Disconnected {
            return Err(TunnelError::InvalidState(status));
        }

        info!(
            bundle_id = %Masked::new(&identity.bundle_id, self.masks_private_data),
            "Installing tunnel"
        );
        if let Err(e) = self.register(&mut identity).await {
            return Err(self.fail(e));
        }

        {
            let mut state = self.state();
            state.identity = Some(identity);
            state.enabled = true;
        }
        self.publish_reinstalled();
        self.transition(TunnelStatus::Disconnected);
        Ok(())
    }

    async fn reconnect(&self, after: Duration) -> TunnelResult<()> {
        let _sequence = self.begin("reconnect")?;
        {
            let mut state = self.state();
            if state.identity.is_none() {
                return Err(TunnelError::NotInstalled);
            }
            state.enabled = true;
        }

        self.restart(after).await
    }

    async fn reconnect_with(&self, mut identity: TunnelIdentity, after: Duration) -> TunnelResult<()> {
        let _sequence = self.begin("reconnect")?;
        info!(
            bundle_id = %Masked::new(&identity.bundle_id, self.masks_private_data),
            "Reinstalling tunnel"
        );

        if let Err(e) = self.register(&mut identity).await {
            // the old profile may still be running
            if self.status() == TunnelStatus::Connected {
                self.provisioning.stop().await;
            }
            return Err(self.fail(e));
        }

        {
            let mut state = self.state();
            state.identity = Some(identity);
            state.enabled = true;
        }
        self.publish_reinstalled();
        self.restart(after).await
    }

    async fn disconnect(&self) -> TunnelResult<()> {
        let _sequence = self.begin("disconnect")?;
        if self.status() == TunnelStatus::Disconnected {
            debug!("Already disconnected");
            return Ok(());
        }

        self.transition(TunnelStatus::Disconnecting);
        self.provisioning.stop().await;
        self.state().enabled = false;
        self.transition(TunnelStatus::Disconnected);
        Ok(())
    }

    async fn uninstall(&self) {
        let _sequence = self.sequence.lock().await;

        let event = {
            let mut state = self.state();
            let bundle_id = state.bundle_id();
            state.set_status(TunnelStatus::Disconnected);
            state.identity = None;
            state.enabled = false;
            LifecycleEvent::StatusChanged {
                bundle_id,
                enabled: false,
                status: TunnelStatus::Disconnected,
            }
        };
        info!(
            bundle_id = %Masked::new(&BundleLabel(event_bundle(&event)), self.masks_private_data),
            "Uninstalling tunnel"
        );
        self.bus.publish(&event);

        if let Err(e) = self.provisioning.remove().await {
            warn!(error = %e, "Failed to remove tunnel profile, local state already cleared");
        }
    }

    fn status(&self) -> TunnelStatus {
        self.state().status
    }

    fn identity(&self) -> Option<TunnelIdentity> {
        self.state().identity.clone()
    }

    fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    fn notifications(&self) -> &NotificationBus {
        &self.bus
    }
}

impl<P: fmt::Debug> fmt::Debug for TunnelController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("TunnelController")
            .field("provisioning", &self.provisioning)
            .field("status", &state.status)
            .field("enabled", &state.enabled)
            .field("bus", &self.bus)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl SimulatedTunnel {
    /// Simulated tunnel using the configured connect/teardown delay.
    pub fn simulated(config: &CoreConfig) -> Self {
        TunnelController::from_config(
            SimulatedProvisioning::new(config.lifecycle.simulated_delay()),
            config,
        )
    }
}

impl CommandTunnel {
    /// Tunnel driven by the configured provisioning commands.
    pub fn with_commands(config: &CoreConfig) -> Self {
        TunnelController::from_config(
            CommandProvisioning::new(config.provisioning.clone()),
            config,
        )
    }
}

fn event_bundle(event: &LifecycleEvent) -> Option<&BundleId> {
    match event {
        LifecycleEvent::Reinstalled { bundle_id, .. }
        | LifecycleEvent::StatusChanged { bundle_id, .. } => bundle_id.as_ref(),
        LifecycleEvent::Failed { .. } => None,
    }
}

struct BundleLabel<'a>(Option<&'a BundleId>);

impl fmt::Display for BundleLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => id.fmt(f),
            None => f.write_str("-"),
        }
    }
}
