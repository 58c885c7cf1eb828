//! Datapoint id classes
//!
//! Which ids are always battery, which alternate between battery and an
//! alarm, and which carry cell voltage depends on the firmware family, so
//! the classes are data rather than code. A device class can replace the
//! default policy wholesale from configuration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw unit of a voltage datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageUnit {
    Millivolts,
    /// Hundredths of a volt (raw × 10 = mV)
    Centivolts,
    /// Tenths of a volt (raw × 100 = mV)
    Decivolts,
}

impl VoltageUnit {
    pub fn to_millivolts(self, raw: i64) -> i64 {
        match self {
            Self::Millivolts => raw,
            Self::Centivolts => raw.saturating_mul(10),
            Self::Decivolts => raw.saturating_mul(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("DP {0} is assigned to more than one id class")]
    Overlap(u8),

    #[error("DP {0} has an empty alarm source")]
    EmptySource(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    hard_battery: BTreeSet<u8>,
    context_dependent: BTreeMap<u8, String>,
    voltage: BTreeMap<u8, VoltageUnit>,
}

impl Default for RoutingPolicy {
    /// Common Tuya sensor firmware family
    fn default() -> Self {
        Self {
            hard_battery: [4, 15].into_iter().collect(),
            context_dependent: [
                (1, "alarm_generic".to_string()),
                (5, "alarm_tamper".to_string()),
                (101, "alarm_motion".to_string()),
            ]
            .into_iter()
            .collect(),
            voltage: [(21, VoltageUnit::Millivolts)].into_iter().collect(),
        }
    }
}

impl RoutingPolicy {
    /// Build a policy, rejecting ids claimed by more than one class
    pub fn new(
        hard_battery: impl IntoIterator<Item = u8>,
        context_dependent: impl IntoIterator<Item = (u8, String)>,
        voltage: impl IntoIterator<Item = (u8, VoltageUnit)>,
    ) -> Result<Self, PolicyError> {
        let hard_battery: BTreeSet<u8> = hard_battery.into_iter().collect();
        let mut context: BTreeMap<u8, String> = BTreeMap::new();
        for (id, source) in context_dependent {
            if source.trim().is_empty() {
                return Err(PolicyError::EmptySource(id));
            }
            if hard_battery.contains(&id) || context.insert(id, source).is_some() {
                return Err(PolicyError::Overlap(id));
            }
        }
        let mut volts: BTreeMap<u8, VoltageUnit> = BTreeMap::new();
        for (id, unit) in voltage {
            if hard_battery.contains(&id)
                || context.contains_key(&id)
                || volts.insert(id, unit).is_some()
            {
                return Err(PolicyError::Overlap(id));
            }
        }
        Ok(Self {
            hard_battery,
            context_dependent: context,
            voltage: volts,
        })
    }

    pub fn is_hard_battery(&self, id: u8) -> bool {
        self.hard_battery.contains(&id)
    }

    /// Alarm source for a context-dependent id
    pub fn context_source(&self, id: u8) -> Option<&str> {
        self.context_dependent.get(&id).map(String::as_str)
    }

    pub fn voltage_unit(&self, id: u8) -> Option<VoltageUnit> {
        self.voltage.get(&id).copied()
    }

    /// Whether any class claims `id`
    pub fn claims(&self, id: u8) -> bool {
        self.is_hard_battery(id)
            || self.context_dependent.contains_key(&id)
            || self.voltage.contains_key(&id)
    }
}
