//! Hostname resolution with a hard deadline, plus IPv4 helpers.

mod claim;
mod ipv4;
mod resolver;
mod transport;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use claim::ClaimGuard;
pub use ipv4::{ipv4_from_string, ipv4_to_string};
pub use resolver::AddressResolver;
pub use transport::{RawAddress, ResolverTransport, SystemResolver};

/// Outcome of a single resolution request.
pub type ResolutionOutcome = Result<Vec<AddressRecord>, ResolutionError>;

/// Errors coming from [`AddressResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Lookup failed or produced no usable address
    #[error("DNS lookup failed")]
    LookupFailed,

    /// The deadline elapsed first
    #[error("DNS lookup timed out")]
    TimedOut,
}

/// A resolved address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Numeric address text
    pub address: String,
    /// `true` if IPv6
    pub is_ipv6: bool,
}

impl AddressRecord {
    /// Create a record.
    pub fn new(address: impl Into<String>, is_ipv6: bool) -> Self {
        AddressRecord {
            address: address.into(),
            is_ipv6,
        }
    }

    /// Build a record from raw bytes; `None` if they do not format.
    pub fn from_raw(raw: &RawAddress) -> Option<Self> {
        let address = raw.numeric_host()?;
        Some(AddressRecord {
            address,
            is_ipv6: raw.is_ipv6(),
        })
    }
}

/// The protocol used to reach DNS servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsProtocol {
    /// Plaintext DNS (port 53)
    #[default]
    Plain,
    /// DNS over HTTPS
    Https,
    /// DNS over TLS (port 853)
    Tls,
}

impl DnsProtocol {
    /// The value to fall back to when unset.
    pub const FALLBACK: DnsProtocol = DnsProtocol::Plain;
}
