//! Traffic counters and human-readable formatting helpers.

mod data_unit;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use data_unit::{format_bytes, DataUnit};

/// A pair of received/sent byte counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCount {
    /// Received bytes
    pub received: u64,
    /// Sent bytes
    pub sent: u64,
}

impl DataCount {
    /// Create a counter pair.
    pub fn new(received: u64, sent: u64) -> Self {
        DataCount { received, sent }
    }

    /// Parse the counters out of a WireGuard runtime configuration dump.
    ///
    /// The first line must be `rx_bytes=<n>` and the second `tx_bytes=<n>`;
    /// anything else yields `None`.
    pub fn from_wireguard_string(text: &str) -> Option<Self> {
        let mut lines = text.split('\n').filter(|line| !line.is_empty());
        let received = counter(lines.next()?, "rx_bytes=")?;
        let sent = counter(lines.next()?, "tx_bytes=")?;
        Some(DataCount { received, sent })
    }
}

fn counter(line: &str, prefix: &str) -> Option<u64> {
    line.strip_prefix(prefix)?.parse().ok()
}

/// Render a duration as `1h2m3s`, omitting zero components.
pub fn as_time_string(duration: Duration) -> String {
    let mut ticks = duration.as_secs();
    let hours = ticks / 3600;
    ticks %= 3600;
    let minutes = ticks / 60;
    let seconds = ticks % 60;

    [(hours, 'h'), (minutes, 'm'), (seconds, 's')]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect()
}
