//! Time Formatting

use serde::{Deserialize, Serialize};

/// Display unit for durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    S,
    Ms,
    Us,
    Ns,
}

impl TimeUnit {
    /// Seconds per unit
    pub fn factor(self) -> f64 {
        match self {
            TimeUnit::S => 1.0,
            TimeUnit::Ms => 1.0e-3,
            TimeUnit::Us => 1.0e-6,
            TimeUnit::Ns => 1.0e-9,
        }
    }

    /// Short label used in column headers
    pub fn label(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(TimeUnit::S),
            "ms" => Ok(TimeUnit::Ms),
            "us" | "µs" => Ok(TimeUnit::Us),
            "ns" => Ok(TimeUnit::Ns),
            other => Err(format!("Unknown time unit: {}", other)),
        }
    }
}

/// Format `seconds` in `unit` with three decimals; tiny values print as `< 0.001`.
pub fn format_time(seconds: f64, unit: TimeUnit) -> String {
    let value = seconds / unit.factor();
    if value < 0.001 {
        "< 0.001".to_string()
    } else {
        format!("{:.3}", value)
    }
}
