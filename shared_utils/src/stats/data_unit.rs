//! Byte counts expressed in B, kB, MB or GB.

use std::fmt;

/// Binary data unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUnit {
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
}

impl DataUnit {
    /// Units from largest to smallest.
    const DESCENDING: [DataUnit; 4] = [
        DataUnit::Gigabyte,
        DataUnit::Megabyte,
        DataUnit::Kilobyte,
        DataUnit::Byte,
    ];

    /// Number of bytes in one unit.
    pub fn bytes(self) -> u64 {
        match self {
            DataUnit::Byte => 1,
            DataUnit::Kilobyte => 1024,
            DataUnit::Megabyte => 1_048_576,
            DataUnit::Gigabyte => 1_073_741_824,
        }
    }

    fn shows_decimals(self) -> bool {
        matches!(self, DataUnit::Megabyte | DataUnit::Gigabyte)
    }

    // a value is shown in this unit once it reaches a tenth of it
    fn boundary(self) -> u64 {
        (0.1 * self.bytes() as f64) as u64
    }
}

impl fmt::Display for DataUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataUnit::Byte => "B",
            DataUnit::Kilobyte => "kB",
            DataUnit::Megabyte => "MB",
            DataUnit::Gigabyte => "GB",
        })
    }
}

/// Format a byte count in the largest fitting unit, e.g. `1.50MB`.
pub fn format_bytes(count: u64) -> String {
    if count == 0 {
        return "0B".to_string();
    }
    for unit in DataUnit::DESCENDING {
        if count >= unit.boundary() {
            if !unit.shows_decimals() {
                return format!("{}{}", count / unit.bytes(), unit);
            }
            let value = count as f64 / unit.bytes() as f64;
            return format!("{value:.2}{unit}");
        }
    }
    // boundary of Byte is 0, so the loop always returns
    format!("{count}B")
}
