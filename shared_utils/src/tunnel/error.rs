//! Error types for the tunnel module.

use thiserror::Error;

use crate::keychain::CredentialError;
use crate::tunnel::types::TunnelStatus;

/// Result type for tunnel operations.
pub type TunnelResult<T> = Result<T, TunnelError>;

/// Result type for provisioning service calls.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Failures reported by the external provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// The tunnel profile could not be registered
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    /// The tunnel could not be started
    #[error("Start failed: {0}")]
    StartFailed(String),

    /// The tunnel profile could not be removed
    #[error("Removal failed: {0}")]
    RemovalFailed(String),
}

/// Error types that can occur in tunnel lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunnelError {
    /// Credential store error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Provisioning service error
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    /// Another lifecycle sequence is in flight
    #[error("Tunnel busy: another lifecycle operation is in progress")]
    Busy,

    /// No identity has been installed
    #[error("Tunnel not installed")]
    NotInstalled,

    /// Operation not valid in the current status
    #[error("Invalid state: {0}")]
    InvalidState(TunnelStatus),
}
