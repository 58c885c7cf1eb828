use serde::{Deserialize, Serialize};

/// Coarse battery health bucket derived from percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryStatus {
    Good,
    Medium,
    Low,
    Critical,
    Dead,
}

impl BatteryStatus {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            81.. => Self::Good,
            51..=80 => Self::Medium,
            21..=50 => Self::Low,
            11..=20 => Self::Critical,
            _ => Self::Dead,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Critical => "critical",
            Self::Dead => "dead",
        }
    }

    /// Whether a host should surface a replace-battery warning
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::Critical | Self::Dead)
    }
}
