//! Lifecycle control of a single managed network tunnel.
//!
//! This module provides the tunnel state machine, the events it publishes,
//! and the provisioning services it drives. The controller validates each
//! request against the current status, stores credentials through the
//! keychain adapter, calls the provisioning service, and publishes every
//! transition on a [`NotificationBus`].

mod command;
mod config;
mod controller;
mod error;
mod notification;
mod provisioning;
pub mod types;

pub use command::CommandProvisioning;
pub use config::{
    Credentials, InterfaceType, OnDemandAction, OnDemandRule, TunnelConfiguration, TunnelExtra,
    TunnelIdentity, TunnelProtocol,
};
pub use controller::{
    CommandTunnel, SharedCredentials, SimulatedTunnel, TunnelControl, TunnelController,
    TunnelSnapshot,
};
pub use error::{ProvisioningError, ProvisioningResult, TunnelError, TunnelResult};
pub use notification::{LifecycleEvent, NotificationBus, Subscription, SubscriptionId};
pub use provisioning::{ProvisioningCall, ProvisioningService, ReportedState, SimulatedProvisioning};
pub use types::{BundleId, TunnelStatus};
