//! Latency unit normalization
//!
//! Cassandra exposes every latency timer together with a `LatencyUnit`
//! attribute (a `java.util.concurrent.TimeUnit` name). Downstream, every
//! latency value is milliseconds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time unit advertised by a remote latency timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LatencyUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl LatencyUnit {
    /// Parse a `TimeUnit` name (`"MICROSECONDS"`, `"microseconds"`...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NANOSECONDS" => Some(Self::Nanoseconds),
            "MICROSECONDS" => Some(Self::Microseconds),
            "MILLISECONDS" => Some(Self::Milliseconds),
            "SECONDS" => Some(Self::Seconds),
            "MINUTES" => Some(Self::Minutes),
            "HOURS" => Some(Self::Hours),
            "DAYS" => Some(Self::Days),
            _ => None,
        }
    }

    /// Multiplier turning a value in this unit into milliseconds
    pub fn millis_factor(self) -> f64 {
        match self {
            Self::Nanoseconds => 1.0e-6,
            Self::Microseconds => 0.001,
            Self::Milliseconds => 1.0,
            Self::Seconds => 1000.0,
            Self::Minutes => 60_000.0,
            Self::Hours => 3_600_000.0,
            Self::Days => 86_400_000.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "NANOSECONDS",
            Self::Microseconds => "MICROSECONDS",
            Self::Milliseconds => "MILLISECONDS",
            Self::Seconds => "SECONDS",
            Self::Minutes => "MINUTES",
            Self::Hours => "HOURS",
            Self::Days => "DAYS",
        }
    }
}

impl fmt::Display for LatencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a latency sample to milliseconds.
///
/// An absent value stays absent. An unrecognized unit (`None`) leaves the
/// value untouched.
pub fn to_millis(value: Option<f64>, unit: Option<LatencyUnit>) -> Option<f64> {
    let value = value?;
    match unit {
        Some(LatencyUnit::Milliseconds) | None => Some(value),
        Some(unit) => Some(value * unit.millis_factor()),
    }
}
