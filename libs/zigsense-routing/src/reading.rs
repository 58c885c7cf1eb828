use serde::Serialize;

/// Normalized, protocol-independent output of routing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    BatteryPercent(u8),
    Measurement { capability: String, value: f64 },
    AlarmEdge { source: String, active: bool },
    Heartbeat,
    Command { name: String, value: i64 },
}

impl Reading {
    pub fn measurement(capability: impl Into<String>, value: f64) -> Self {
        Self::Measurement {
            capability: capability.into(),
            value,
        }
    }

    pub fn alarm(source: impl Into<String>, active: bool) -> Self {
        Self::AlarmEdge {
            source: source.into(),
            active,
        }
    }

    pub fn command(name: impl Into<String>, value: i64) -> Self {
        Self::Command {
            name: name.into(),
            value,
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::AlarmEdge { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BatteryPercent(_) => "battery",
            Self::Measurement { .. } => "measurement",
            Self::AlarmEdge { .. } => "alarm",
            Self::Heartbeat => "heartbeat",
            Self::Command { .. } => "command",
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BatteryPercent(p) => write!(f, "battery {}%", p),
            Self::Measurement { capability, value } => write!(f, "{}={}", capability, value),
            Self::AlarmEdge { source, active } => {
                write!(f, "{} {}", source, if *active { "on" } else { "off" })
            },
            Self::Heartbeat => write!(f, "heartbeat"),
            Self::Command { name, value } => write!(f, "{}({})", name, value),
        }
    }
}
