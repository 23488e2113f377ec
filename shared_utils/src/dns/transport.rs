//! Name-lookup transports used by the address resolver.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;

/// Raw address bytes as returned by the platform resolver.
///
/// The byte length identifies the family: 4 bytes for IPv4, 16 for IPv6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAddress(pub Vec<u8>);

impl RawAddress {
    /// Numeric host text, or `None` if the bytes are not a valid address.
    pub fn numeric_host(&self) -> Option<String> {
        match self.0.len() {
            4 => {
                let octets: [u8; 4] = self.0.as_slice().try_into().ok()?;
                Some(Ipv4Addr::from(octets).to_string())
            }
            16 => {
                let octets: [u8; 16] = self.0.as_slice().try_into().ok()?;
                Some(Ipv6Addr::from(octets).to_string())
            }
            _ => None,
        }
    }

    /// Whether the address structure is the 16-byte IPv6 family.
    pub fn is_ipv6(&self) -> bool {
        self.0.len() == 16
    }
}

impl From<IpAddr> for RawAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => RawAddress(v4.octets().to_vec()),
            IpAddr::V6(v6) => RawAddress(v6.octets().to_vec()),
        }
    }
}

/// Name lookup primitive the resolver races against its deadline.
#[async_trait]
pub trait ResolverTransport: Send + Sync {
    /// Look up every address of `hostname`.
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<RawAddress>>;

    /// Best-effort cancellation of an outstanding lookup of `hostname`.
    ///
    /// The lookup future is dropped in any case; transports that hand work
    /// to another system component override this to stop it there too.
    fn cancel(&self, _hostname: &str) {}
}

/// Transport backed by the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl ResolverTransport for SystemResolver {
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<RawAddress>> {
        let addrs = tokio::net::lookup_host((hostname, 0)).await?;
        Ok(addrs.map(|addr| RawAddress::from(addr.ip())).collect())
    }
}
