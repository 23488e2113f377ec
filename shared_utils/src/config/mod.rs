//! Configuration management module for the tunnel toolkit.
//!
//! This module provides functionality for loading, parsing, and managing
//! the settings shared by the tunnel controller, the credential adapter and
//! the address resolver. A [`CoreConfig`] is an explicit value handed to the
//! components that need it; there is no process-wide configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Log levels accepted by `log_level`.
pub const KNOWN_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    /// Error parsing TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Error serializing configuration to TOML
    #[error("Failed to serialize config to TOML: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Missing required configuration value
    #[error("Missing required configuration value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Address resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Default resolution deadline in milliseconds (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ResolverConfig {
    /// Returns the resolution deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Tunnel lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Pause between teardown and restart on reconnect, in milliseconds (default: 1000)
    #[serde(default = "default_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Connect and teardown delay of the simulated tunnel, in milliseconds (default: 1000)
    #[serde(default = "default_delay_ms")]
    pub simulated_delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    1_000
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            reconnect_delay_ms: default_delay_ms(),
            simulated_delay_ms: default_delay_ms(),
        }
    }
}

impl LifecycleConfig {
    /// Returns the reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Returns the simulated delay as a [`Duration`].
    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }
}

/// Secret store settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct KeychainConfig {
    /// Access group scoping every stored credential
    #[serde(default)]
    pub access_group: Option<String>,
}

/// External commands driving the command-backed provisioning service.
///
/// Every command runs through `sh -c`. `{bundle_id}` stands for the tunnel's
/// bundle identifier, passed to the shell as a positional argument rather
/// than spliced into the script, so it must not be quoted in the template.
/// A missing command is a successful no-op.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub register_command: Option<String>,
    #[serde(default)]
    pub start_command: Option<String>,
    #[serde(default)]
    pub stop_command: Option<String>,
    #[serde(default)]
    pub remove_command: Option<String>,

    /// Prints `<status> [enabled|disabled]` for the installed tunnel
    #[serde(default)]
    pub status_command: Option<String>,

    /// Prints WireGuard style `rx_bytes=`/`tx_bytes=` counters
    #[serde(default)]
    pub stats_command: Option<String>,
}

impl ProvisioningConfig {
    /// Configured commands keyed by their field name.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("register_command", self.register_command.as_deref()),
            ("start_command", self.start_command.as_deref()),
            ("stop_command", self.stop_command.as_deref()),
            ("remove_command", self.remove_command.as_deref()),
            ("status_command", self.status_command.as_deref()),
            ("stats_command", self.stats_command.as_deref()),
        ]
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoreConfig {
    /// Log level (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Mask hostnames and bundle identifiers in logs (default: true)
    #[serde(default = "default_true")]
    pub masks_private_data: bool,

    /// Free-form build identifier
    #[serde(default)]
    pub version_identifier: Option<String>,

    /// Resolver configuration
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Lifecycle configuration
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Keychain configuration
    #[serde(default)]
    pub keychain: KeychainConfig,

    /// Provisioning commands
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            log_level: default_log_level(),
            masks_private_data: default_true(),
            version_identifier: None,
            resolver: ResolverConfig::default(),
            lifecycle: LifecycleConfig::default(),
            keychain: KeychainConfig::default(),
            provisioning: ProvisioningConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        CoreConfig::default()
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;

        // Environment variables take precedence over the file
        Self::apply_env_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Parse and validate configuration text, without environment overrides
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: CoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.resolver.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "resolver.timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let level = self.log_level.to_ascii_lowercase();
        if !KNOWN_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "log_level".to_string(),
                message: format!("unknown level '{}'", self.log_level),
            });
        }

        if let Some(group) = &self.keychain.access_group {
            if group.trim().is_empty() {
                return Err(ConfigError::MissingValue(
                    "keychain.access_group".to_string(),
                ));
            }
        }

        for (key, command) in self.provisioning.entries() {
            if command.is_some_and(|command| command.trim().is_empty()) {
                return Err(ConfigError::MissingValue(format!("provisioning.{}", key)));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides (prefix: TUNNELKIT_)
    /// Example keys:
    /// - TUNNELKIT_LOG_LEVEL, TUNNELKIT_MASKS_PRIVATE_DATA, TUNNELKIT_VERSION_IDENTIFIER
    /// - TUNNELKIT_RESOLVER_TIMEOUT_MS
    /// - TUNNELKIT_LIFECYCLE_RECONNECT_DELAY_MS, TUNNELKIT_LIFECYCLE_SIMULATED_DELAY_MS
    /// - TUNNELKIT_KEYCHAIN_ACCESS_GROUP
    /// - TUNNELKIT_PROVISIONING_{REGISTER,START,STOP,REMOVE,STATUS,STATS}_COMMAND
    pub fn apply_env_overrides(cfg: &mut CoreConfig) {
        use std::env;

        fn parse_bool(s: &str) -> Option<bool> {
            match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Some(true),
                "false" | "0" | "no" | "n" => Some(false),
                _ => None,
            }
        }
        fn parse_u64(s: &str) -> Option<u64> {
            s.parse().ok()
        }
        fn non_empty(key: &str) -> Option<String> {
            env::var(key).ok().filter(|v| !v.is_empty())
        }

        // Top-level
        if let Some(v) = non_empty("TUNNELKIT_LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Ok(v) = env::var("TUNNELKIT_MASKS_PRIVATE_DATA") {
            if let Some(b) = parse_bool(&v) {
                cfg.masks_private_data = b;
            }
        }
        if let Some(v) = non_empty("TUNNELKIT_VERSION_IDENTIFIER") {
            cfg.version_identifier = Some(v);
        }

        // Resolver
        if let Ok(v) = env::var("TUNNELKIT_RESOLVER_TIMEOUT_MS") {
            if let Some(n) = parse_u64(&v) {
                cfg.resolver.timeout_ms = n;
            }
        }

        // Lifecycle
        if let Ok(v) = env::var("TUNNELKIT_LIFECYCLE_RECONNECT_DELAY_MS") {
            if let Some(n) = parse_u64(&v) {
                cfg.lifecycle.reconnect_delay_ms = n;
            }
        }
        if let Ok(v) = env::var("TUNNELKIT_LIFECYCLE_SIMULATED_DELAY_MS") {
            if let Some(n) = parse_u64(&v) {
                cfg.lifecycle.simulated_delay_ms = n;
            }
        }

        // Keychain
        if let Some(v) = non_empty("TUNNELKIT_KEYCHAIN_ACCESS_GROUP") {
            cfg.keychain.access_group = Some(v);
        }

        // Provisioning
        let commands = [
            ("TUNNELKIT_PROVISIONING_REGISTER_COMMAND", &mut cfg.provisioning.register_command),
            ("TUNNELKIT_PROVISIONING_START_COMMAND", &mut cfg.provisioning.start_command),
            ("TUNNELKIT_PROVISIONING_STOP_COMMAND", &mut cfg.provisioning.stop_command),
            ("TUNNELKIT_PROVISIONING_REMOVE_COMMAND", &mut cfg.provisioning.remove_command),
            ("TUNNELKIT_PROVISIONING_STATUS_COMMAND", &mut cfg.provisioning.status_command),
            ("TUNNELKIT_PROVISIONING_STATS_COMMAND", &mut cfg.provisioning.stats_command),
        ];
        for (key, slot) in commands {
            if let Some(v) = non_empty(key) {
                *slot = Some(v);
            }
        }
    }

    /// Reload configuration from the same file it was loaded from
    pub fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        *self = Self::load(path)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("tunnelkit").join("config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }
}

/// Configuration manager for handling configuration loading and reloading.
#[derive(Debug)]
pub struct ConfigManager {
    /// Current configuration
    config: CoreConfig,
    /// Path to the configuration file
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with the default configuration
    pub fn new() -> Self {
        ConfigManager {
            config: CoreConfig::default(),
            config_path: CoreConfig::default_path(),
        }
    }

    /// Load configuration from the specified path
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let config = CoreConfig::load(&path)?;

        Ok(ConfigManager {
            config,
            config_path: path,
        })
    }

    /// Load configuration from the default path
    pub fn load_default() -> ConfigResult<Self> {
        Self::load(CoreConfig::default_path())
    }

    /// Get a reference to the current configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Get a mutable reference to the current configuration
    pub fn config_mut(&mut self) -> &mut CoreConfig {
        &mut self.config
    }

    /// Reload configuration from the current path
    pub fn reload(&mut self) -> ConfigResult<()> {
        self.config.reload(&self.config_path)
    }

    /// Save the current configuration to the current path
    pub fn save(&self) -> ConfigResult<()> {
        self.config.save(&self.config_path)
    }

    /// Save the current configuration to a new path
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        self.config.save(path)
    }

    /// Get the current configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
