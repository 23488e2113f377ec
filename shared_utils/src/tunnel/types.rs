//! Type definitions for the tunnel module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bundle identifier of the tunnel provider being controlled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub String);

impl BundleId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BundleId {
    fn from(s: String) -> Self {
        BundleId(s)
    }
}

impl From<&str> for BundleId {
    fn from(s: &str) -> Self {
        BundleId(s.to_string())
    }
}

/// Lifecycle status of the controlled tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    /// Tunnel is down (initial state)
    #[default]
    Disconnected,
    /// Tunnel is being brought up
    Connecting,
    /// Tunnel is up
    Connected,
    /// Tunnel is being torn down
    Disconnecting,
}

impl TunnelStatus {
    /// Returns `true` while a connect or teardown phase is running.
    pub fn is_transitional(self) -> bool {
        matches!(self, TunnelStatus::Connecting | TunnelStatus::Disconnecting)
    }

    /// Lowercase name, as used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TunnelStatus::Disconnected => "disconnected",
            TunnelStatus::Connecting => "connecting",
            TunnelStatus::Connected => "connected",
            TunnelStatus::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TunnelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnected" | "invalid" => Ok(TunnelStatus::Disconnected),
            "connecting" | "reasserting" => Ok(TunnelStatus::Connecting),
            "connected" => Ok(TunnelStatus::Connected),
            "disconnecting" => Ok(TunnelStatus::Disconnecting),
            other => Err(format!("unknown tunnel status '{}'", other)),
        }
    }
}
