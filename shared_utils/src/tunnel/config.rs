//! Configuration objects identifying the controlled tunnel.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::keychain::SecretRef;
use crate::logging::Masked;
use crate::tunnel::types::BundleId;

/// Protocol engine driving the tunnel data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelProtocol {
    /// OpenVPN-style engine
    OpenVpn,
    /// WireGuard-style engine
    WireGuard,
}

/// Username and password handed to the credential store on install.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Secret, never logged nor serialized
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl Credentials {
    /// Create a credentials pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &Masked::sensitive(self.password.as_str()))
            .finish()
    }
}

/// Protocol-specific configuration, opaque to the controller.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TunnelConfiguration {
    /// Profile title shown to the user
    pub title: String,

    /// Protocol engine
    pub protocol: TunnelProtocol,

    /// Engine settings, passed through untouched
    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    /// Optional credentials to persist in the secure store
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl TunnelConfiguration {
    /// Create a configuration with no settings.
    pub fn new(title: impl Into<String>, protocol: TunnelProtocol) -> Self {
        TunnelConfiguration {
            title: title.into(),
            protocol,
            settings: BTreeMap::new(),
            credentials: None,
        }
    }

    /// Add an engine setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Attach credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// What an on-demand rule does when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDemandAction {
    Connect,
    Disconnect,
    Ignore,
    Evaluate,
}

/// Network interface kind matched by an on-demand rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Any,
    Ethernet,
    WiFi,
    Cellular,
}

/// Rule telling the host when to bring the tunnel up or down on its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OnDemandRule {
    /// Action taken on match
    pub action: OnDemandAction,

    /// Interface to match, any when unset
    #[serde(default)]
    pub interface: Option<InterfaceType>,

    /// Wi-Fi networks to match, any when empty
    #[serde(default)]
    pub ssids: Vec<String>,
}

impl OnDemandRule {
    /// Rule matching every network.
    pub fn new(action: OnDemandAction) -> Self {
        OnDemandRule {
            action,
            interface: None,
            ssids: Vec::new(),
        }
    }
}

/// Optional extra options attached to an installed tunnel.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TunnelExtra {
    /// Reference to a password held in the secure store
    #[serde(default)]
    pub password_reference: Option<SecretRef>,

    /// On-demand rules
    #[serde(default)]
    pub on_demand_rules: Vec<OnDemandRule>,

    /// Disconnect when the host goes to sleep
    #[serde(default)]
    pub disconnects_on_sleep: bool,

    /// Best-effort kill switch
    #[serde(default)]
    pub kill_switch: bool,

    /// Arbitrary user data
    #[serde(default)]
    pub user_data: BTreeMap<String, String>,
}

/// The bundle/profile and configuration of the controlled tunnel.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelIdentity {
    /// Provider bundle identifier
    pub bundle_id: BundleId,

    /// Active configuration
    pub configuration: TunnelConfiguration,

    /// Extra options
    pub extra: Option<TunnelExtra>,
}

impl TunnelIdentity {
    /// Create an identity without extra options.
    pub fn new(bundle_id: impl Into<BundleId>, configuration: TunnelConfiguration) -> Self {
        TunnelIdentity {
            bundle_id: bundle_id.into(),
            configuration,
            extra: None,
        }
    }

    /// Attach extra options.
    pub fn with_extra(mut self, extra: TunnelExtra) -> Self {
        self.extra = Some(extra);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_credentials_serialize_without_password() {
        let creds = Credentials::new("alice", "hunter2");
        let written = toml::to_string(&creds).unwrap();
        assert!(written.contains("alice"));
        assert!(!written.contains("hunter2"));

        let read: Credentials = toml::from_str(&written).unwrap();
        assert_eq!(read.username, "alice");
        assert!(read.password.is_empty());
    }

    #[test]
    fn test_extra_from_toml() {
        let extra: TunnelExtra = toml::from_str(
            r#"
            kill_switch = true

            [[on_demand_rules]]
            action = "connect"
            interface = "wifi"
            ssids = ["Office"]
            "#,
        )
        .unwrap();

        assert!(extra.kill_switch);
        assert!(!extra.disconnects_on_sleep);
        assert_eq!(extra.on_demand_rules.len(), 1);
        assert_eq!(extra.on_demand_rules[0].action, OnDemandAction::Connect);
        assert_eq!(extra.on_demand_rules[0].interface, Some(InterfaceType::WiFi));
    }

    #[test]
    fn test_identity_builder() {
        let identity = TunnelIdentity::new(
            "com.example.wg",
            TunnelConfiguration::new("Home", TunnelProtocol::WireGuard)
                .with_setting("endpoint", "vpn.example.com:51820"),
        )
        .with_extra(TunnelExtra::default());

        assert_eq!(identity.bundle_id.as_str(), "com.example.wg");
        assert_eq!(
            identity.configuration.settings.get("endpoint").map(String::as_str),
            Some("vpn.example.com:51820")
        );
        assert!(identity.extra.is_some());
    }
}
