use serde::{Deserialize, Serialize};

fn default_divisor() -> f64 {
    1.0
}

/// Meaning assigned to a datapoint id by device configuration
///
/// Serialized externally tagged, e.g. `battery`,
/// `{measurement: {capability: measure_temperature, divisor: 10}}` or
/// `{unknown: 240}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semantic {
    /// Charge level, same coercion as the hard-battery ids
    Battery,
    /// Three-step charge enum: low / medium / high
    BatteryState,
    Measurement {
        capability: String,
        #[serde(default = "default_divisor")]
        divisor: f64,
    },
    Alarm {
        source: String,
        #[serde(default)]
        invert: bool,
    },
    Command {
        name: String,
    },
    /// Known and deliberately dropped
    Ignore,
    /// Vendor-specific id with no normalized meaning
    Unknown(u16),
}

impl Semantic {
    /// Charge reported for each step of a [`Semantic::BatteryState`] enum
    pub const BATTERY_STATE_PERCENT: [u8; 3] = [10, 50, 100];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::BatteryState => "battery_state",
            Self::Measurement { .. } => "measurement",
            Self::Alarm { .. } => "alarm",
            Self::Command { .. } => "command",
            Self::Ignore => "ignore",
            Self::Unknown(_) => "unknown",
        }
    }
}
