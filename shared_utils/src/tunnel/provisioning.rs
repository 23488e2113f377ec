//! Boundary to the host facility that installs, starts and stops tunnels.
//!
//! The controller never talks to the host directly; it drives a
//! [`ProvisioningService`]. [`SimulatedProvisioning`] stands in for the host
//! in tests and demos, [`CommandProvisioning`](super::CommandProvisioning)
//! shells out to configured commands.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::stats::DataCount;
use crate::tunnel::config::TunnelIdentity;
use crate::tunnel::error::{ProvisioningError, ProvisioningResult};
use crate::tunnel::types::{BundleId, TunnelStatus};

/// State of the tunnel as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedState {
    /// Bundle the host has installed, if any
    pub bundle_id: Option<BundleId>,
    /// Whether the installed profile is enabled
    pub enabled: bool,
    /// Host-side status
    pub status: TunnelStatus,
}

/// Host tunnel-provisioning service.
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Register (install or replace) the tunnel profile.
    async fn register(&self, identity: &TunnelIdentity) -> ProvisioningResult<()>;

    /// Start the tunnel. Resolves once the tunnel is established.
    async fn start(&self) -> ProvisioningResult<()>;

    /// Stop the tunnel. Resolves once teardown has completed.
    async fn stop(&self);

    /// Remove the tunnel profile.
    async fn remove(&self) -> ProvisioningResult<()>;

    /// Out-of-band status feed, `None` when the host reports nothing.
    async fn reported_state(&self) -> Option<ReportedState>;

    /// Traffic counters of the running tunnel.
    async fn data_count(&self) -> Option<DataCount> {
        None
    }
}

/// A call received by [`SimulatedProvisioning`], recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningCall {
    Register(BundleId),
    Start,
    Stop,
    Remove,
}

#[derive(Debug, Default)]
struct SimulatedState {
    registered: Option<BundleId>,
    running: bool,
    reported: Option<ReportedState>,
    fail_register: Option<String>,
    fail_start: Option<String>,
    fail_remove: Option<String>,
    data_count: Option<DataCount>,
    calls: Vec<ProvisioningCall>,
}

/// In-memory provisioning service whose start and stop take `delay`.
#[derive(Debug)]
pub struct SimulatedProvisioning {
    delay: Duration,
    state: Mutex<SimulatedState>,
}

impl SimulatedProvisioning {
    /// Create a simulator with the given connect/teardown delay.
    pub fn new(delay: Duration) -> Self {
        SimulatedProvisioning {
            delay,
            state: Mutex::new(SimulatedState::default()),
        }
    }

    /// Simulated connect/teardown delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Make the next registrations fail with `reason`, or succeed with `None`.
    pub fn fail_register(&self, reason: Option<&str>) {
        self.state().fail_register = reason.map(str::to_string);
    }

    /// Make the next starts fail with `reason`, or succeed with `None`.
    pub fn fail_start(&self, reason: Option<&str>) {
        self.state().fail_start = reason.map(str::to_string);
    }

    /// Make the next removals fail with `reason`, or succeed with `None`.
    pub fn fail_remove(&self, reason: Option<&str>) {
        self.state().fail_remove = reason.map(str::to_string);
    }

    /// Set what the out-of-band status feed reports.
    pub fn set_reported_state(&self, reported: Option<ReportedState>) {
        self.state().reported = reported;
    }

    /// Set the counters reported while running.
    pub fn set_data_count(&self, count: Option<DataCount>) {
        self.state().data_count = count;
    }

    /// Bundle currently registered.
    pub fn registered(&self) -> Option<BundleId> {
        self.state().registered.clone()
    }

    /// Whether the simulated tunnel is up.
    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<ProvisioningCall> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedProvisioning {
    fn default() -> Self {
        SimulatedProvisioning::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl ProvisioningService for SimulatedProvisioning {
    async fn register(&self, identity: &TunnelIdentity) -> ProvisioningResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(ProvisioningCall::Register(identity.bundle_id.clone()));
        if let Some(reason) = state.fail_register.clone() {
            return Err(ProvisioningError::RegistrationFailed(reason));
        }
        state.registered = Some(identity.bundle_id.clone());
        debug!(title = %identity.configuration.title, "Simulated registration");
        Ok(())
    }

    async fn start(&self) -> ProvisioningResult<()> {
        self.state().calls.push(ProvisioningCall::Start);
        tokio::time::sleep(self.delay).await;

        let mut state = self.state();
        if let Some(reason) = state.fail_start.clone() {
            return Err(ProvisioningError::StartFailed(reason));
        }
        if state.registered.is_none() {
            return Err(ProvisioningError::StartFailed(
                "no profile registered".to_string(),
            ));
        }
        state.running = true;
        Ok(())
    }

    async fn stop(&self) {
        self.state().calls.push(ProvisioningCall::Stop);
        tokio::time::sleep(self.delay).await;
        self.state().running = false;
    }

    async fn remove(&self) -> ProvisioningResult<()> {
        let mut state = self.state();
        state.calls.push(ProvisioningCall::Remove);
        if let Some(reason) = state.fail_remove.clone() {
            return Err(ProvisioningError::RemovalFailed(reason));
        }
        state.registered = None;
        state.running = false;
        Ok(())
    }

    async fn reported_state(&self) -> Option<ReportedState> {
        self.state().reported.clone()
    }

    async fn data_count(&self) -> Option<DataCount> {
        let state = self.state();
        if state.running { state.data_count } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::config::{TunnelConfiguration, TunnelProtocol};

    fn identity() -> TunnelIdentity {
        TunnelIdentity::new(
            "com.example.sim",
            TunnelConfiguration::new("Sim", TunnelProtocol::OpenVpn),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_lifecycle() {
        let sim = SimulatedProvisioning::new(Duration::from_millis(100));
        sim.register(&identity()).await.unwrap();
        sim.start().await.unwrap();
        assert!(sim.is_running());
        sim.stop().await;
        assert!(!sim.is_running());
        sim.remove().await.unwrap();
        assert_eq!(sim.registered(), None);
        assert_eq!(
            sim.calls(),
            vec![
                ProvisioningCall::Register(BundleId::from("com.example.sim")),
                ProvisioningCall::Start,
                ProvisioningCall::Stop,
                ProvisioningCall::Remove,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_registration_fails() {
        let sim = SimulatedProvisioning::new(Duration::ZERO);
        assert!(matches!(
            sim.start().await,
            Err(ProvisioningError::StartFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_register_failure() {
        let sim = SimulatedProvisioning::new(Duration::ZERO);
        sim.fail_register(Some("denied"));
        assert_eq!(
            sim.register(&identity()).await,
            Err(ProvisioningError::RegistrationFailed("denied".to_string()))
        );
        assert_eq!(sim.registered(), None);
    }
}
