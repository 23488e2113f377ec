//! Shared utilities for the tunnel toolkit.
//!
//! This crate provides the lifecycle controller for a managed network
//! tunnel, a deadline-bounded hostname resolver, the credential adapter in
//! front of the secure store, traffic counter helpers, and the
//! configuration and logging scaffolding shared by every component.

pub mod config;
pub mod dns;
pub mod keychain;
pub mod logging;
pub mod stats;
pub mod tunnel;

// Re-export commonly used items for convenience
pub use config::{ConfigManager, CoreConfig};
pub use dns::AddressResolver;
pub use tunnel::{TunnelControl, TunnelController};
