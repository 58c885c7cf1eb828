//! Per-device routing and liveness state

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use zigsense_battery::{compensate_for_temperature, Chemistry, DischargeCurve};

use crate::policy::RoutingPolicy;
use crate::reading::Reading;
use crate::semantic::Semantic;

/// Capability whose readings feed battery temperature compensation
pub const TEMPERATURE_CAPABILITY: &str = "measure_temperature";

/// State for one physical device
///
/// Owned by exactly one device task; never shared between threads.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device_id: String,
    pub battery_chemistry: Chemistry,
    /// Overrides the chemistry's builtin curve when present
    pub custom_curve: Option<DischargeCurve>,
    pub dp_semantic_overrides: HashMap<u8, Semantic>,
    pub policy: Arc<RoutingPolicy>,
    /// Alarm source used for IAS zone status edges
    pub zone_source: String,
    pub enrollment_pending: bool,
    pub last_alarm_at: Option<i64>,
    /// Most recent ambient temperature in °C, if the device reports one
    pub last_temperature: Option<f64>,
    last_seen_at: i64,
    decode_failures: u64,
    routing_failures: u64,
}

impl DeviceProfile {
    pub fn new(device_id: impl Into<String>, created_at: i64) -> Self {
        Self {
            device_id: device_id.into(),
            battery_chemistry: Chemistry::Unknown,
            custom_curve: None,
            dp_semantic_overrides: HashMap::new(),
            policy: Arc::new(RoutingPolicy::default()),
            zone_source: "alarm_contact".to_string(),
            enrollment_pending: false,
            last_alarm_at: None,
            last_temperature: None,
            last_seen_at: created_at,
            decode_failures: 0,
            routing_failures: 0,
        }
    }

    pub fn with_chemistry(mut self, chemistry: Chemistry) -> Self {
        self.battery_chemistry = chemistry;
        self
    }

    pub fn with_policy(mut self, policy: Arc<RoutingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_override(mut self, id: u8, semantic: Semantic) -> Self {
        self.dp_semantic_overrides.insert(id, semantic);
        self
    }

    pub fn last_seen_at(&self) -> i64 {
        self.last_seen_at
    }

    /// Record contact at `at`; late timestamps never move the clock back
    ///
    /// Returns whether the stored value advanced.
    pub fn touch(&mut self, at: i64) -> bool {
        if at > self.last_seen_at {
            self.last_seen_at = at;
            true
        } else {
            false
        }
    }

    /// Charge for a cell voltage using this device's curve
    ///
    /// A cold reading is compensated with the last reported temperature
    /// before the curve lookup.
    pub fn percent_for_millivolts(&self, mv: u32) -> u8 {
        let chemistry = self.battery_chemistry.resolve(mv);
        let mv = self
            .last_temperature
            .map_or(mv, |celsius| compensate_for_temperature(mv, chemistry, celsius));
        match &self.custom_curve {
            Some(curve) => curve.percent_at(mv),
            None => DischargeCurve::builtin(chemistry).percent_at(mv),
        }
    }

    /// Pin an unconfigured chemistry to the band of the first voltage seen
    ///
    /// Later readings stay on that curve even if they cross a band edge.
    pub fn lock_chemistry(&mut self, mv: u32) {
        if self.battery_chemistry == Chemistry::Unknown {
            self.battery_chemistry = Chemistry::infer_from_millivolts(mv);
            info!(
                device = %self.device_id,
                "Chemistry locked to {} from {} mV",
                self.battery_chemistry,
                mv
            );
        }
    }

    /// Keep whatever later routing decisions depend on
    pub fn observe(&mut self, reading: &Reading) {
        if let Reading::Measurement { capability, value } = reading {
            if capability == TEMPERATURE_CAPABILITY && value.is_finite() {
                self.last_temperature = Some(*value);
            }
        }
    }

    pub fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    pub fn record_routing_failure(&mut self) {
        self.routing_failures += 1;
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    pub fn routing_failures(&self) -> u64 {
        self.routing_failures
    }
}
