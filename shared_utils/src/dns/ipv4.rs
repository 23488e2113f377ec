//! Conversions between numeric and dotted-quad IPv4 addresses.

use std::net::Ipv4Addr;

/// Render a host-order IPv4 address as dotted-quad text.
pub fn ipv4_to_string(ipv4: u32) -> String {
    let mut remainder = ipv4;
    let mut groups = Vec::with_capacity(4);
    let mut base: u32 = 1 << 24;
    while base > 0 {
        groups.push((remainder / base).to_string());
        remainder %= base;
        base >>= 8;
    }
    groups.join(".")
}

/// Parse dotted-quad text into a host-order IPv4 address.
///
/// Returns `None` unless `text` is a strict IPv4 literal.
pub fn ipv4_from_string(text: &str) -> Option<u32> {
    text.parse::<Ipv4Addr>().ok().map(u32::from)
}
