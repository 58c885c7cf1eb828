//! Device liveness tracking

use serde::Serialize;
use tracing::{info, warn};
use zigsense_routing::{DeviceProfile, Reading};

const MS_PER_HOUR: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessThresholds {
    pub warn_ms: i64,
    pub hard_ms: i64,
}

impl LivenessThresholds {
    pub fn from_hours(warn_hours: u32, hard_hours: u32) -> Self {
        Self {
            warn_ms: i64::from(warn_hours) * MS_PER_HOUR,
            hard_ms: i64::from(hard_hours) * MS_PER_HOUR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityChange {
    Unchanged,
    /// Silent past the warn threshold; logged once per silence
    Warned,
    BecameUnavailable,
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    thresholds: LivenessThresholds,
    available: bool,
    warned: bool,
}

impl LivenessMonitor {
    pub fn new(thresholds: LivenessThresholds) -> Self {
        Self {
            thresholds,
            available: true,
            warned: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Any contact from the device
    ///
    /// Returns a heartbeat when the device comes back from unavailable.
    pub fn on_activity(&mut self, profile: &mut DeviceProfile, now: i64) -> Option<Reading> {
        profile.touch(now);
        self.warned = false;
        if self.available {
            return None;
        }
        self.available = true;
        info!(device = %profile.device_id, "Device is back");
        Some(Reading::Heartbeat)
    }

    /// Periodic check against the silence thresholds
    pub fn check_liveness(&mut self, profile: &DeviceProfile, now: i64) -> AvailabilityChange {
        if !self.available {
            return AvailabilityChange::Unchanged;
        }
        let silent_ms = now - profile.last_seen_at();

        if silent_ms >= self.thresholds.hard_ms {
            self.available = false;
            warn!(
                device = %profile.device_id,
                "Unavailable after {}h of silence",
                silent_ms / MS_PER_HOUR
            );
            return AvailabilityChange::BecameUnavailable;
        }
        if silent_ms >= self.thresholds.warn_ms && !self.warned {
            self.warned = true;
            warn!(
                device = %profile.device_id,
                "No contact for {}h",
                silent_ms / MS_PER_HOUR
            );
            return AvailabilityChange::Warned;
        }
        AvailabilityChange::Unchanged
    }
}
