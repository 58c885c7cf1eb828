//! Standard cluster routing
//!
//! Unlike vendor datapoints, ZCL attributes have fixed meanings, so this is a
//! static table keyed by `(cluster, attribute)`.

use tracing::{debug, warn};
use zigsense_codec::zcl::{cluster, ias::ZoneStatus, AttributeRecord, ZclValue};

use crate::error::{RouteError, RouteKey};
use crate::profile::{DeviceProfile, TEMPERATURE_CAPABILITY};
use crate::reading::Reading;
use crate::router::MIN_PLAUSIBLE_MV;

const ATTR_MEASURED_VALUE: u16 = 0x0000;
const ATTR_OCCUPANCY: u16 = 0x0000;
const ATTR_BATTERY_VOLTAGE: u16 = 0x0020;
const ATTR_BATTERY_PERCENT: u16 = 0x0021;

// "Invalid measurement" sentinels
const TEMPERATURE_INVALID: i64 = -0x8000;
const HUMIDITY_INVALID: i64 = 0xFFFF;

/// Route every record of one report
///
/// When a report carries both battery voltage and percent remaining, the
/// device's own percentage wins and the voltage record is skipped.
pub fn route_attributes(
    cluster_id: u16,
    records: &[AttributeRecord],
    profile: &mut DeviceProfile,
) -> Vec<Reading> {
    let has_percent = cluster_id == cluster::POWER_CONFIGURATION
        && records.iter().any(|r| r.attribute == ATTR_BATTERY_PERCENT);

    let mut readings = Vec::with_capacity(records.len());
    for record in records {
        if has_percent && record.attribute == ATTR_BATTERY_VOLTAGE {
            debug!(device = %profile.device_id, "Voltage superseded by percent in same report");
            continue;
        }
        if let Some(reading) = route_attribute(cluster_id, record, profile) {
            readings.push(reading);
        }
    }
    readings
}

/// Route a single attribute, logging and counting discards
pub fn route_attribute(
    cluster_id: u16,
    record: &AttributeRecord,
    profile: &mut DeviceProfile,
) -> Option<Reading> {
    match classify_attribute(cluster_id, record, profile) {
        Ok(reading) => {
            if (cluster_id, record.attribute) == (cluster::POWER_CONFIGURATION, ATTR_BATTERY_VOLTAGE) {
                let mv = record.value.as_i64().saturating_mul(100);
                profile.lock_chemistry(u32::try_from(mv).unwrap_or(u32::MAX));
            }
            profile.observe(&reading);
            Some(reading)
        },
        Err(e) => {
            match e {
                RouteError::Unmapped { .. } => debug!(device = %profile.device_id, "Discarded: {}", e),
                _ => warn!(device = %profile.device_id, "Discarded: {}", e),
            }
            profile.record_routing_failure();
            None
        },
    }
}

fn classify_attribute(
    cluster_id: u16,
    record: &AttributeRecord,
    profile: &DeviceProfile,
) -> Result<Reading, RouteError> {
    let key = RouteKey::Attribute {
        cluster: cluster_id,
        attribute: record.attribute,
    };
    let raw = record.value.as_i64();
    let out_of_range = |min: i64, max: i64| RouteError::OutOfRange {
        key,
        value: raw,
        min,
        max,
    };

    match (cluster_id, record.attribute) {
        (cluster::POWER_CONFIGURATION, ATTR_BATTERY_VOLTAGE) => {
            let mv = raw.saturating_mul(100);
            if mv < MIN_PLAUSIBLE_MV || raw == 0xFF {
                return Err(out_of_range(MIN_PLAUSIBLE_MV / 100, 0xFE));
            }
            Ok(Reading::BatteryPercent(
                profile.percent_for_millivolts(mv as u32),
            ))
        },
        (cluster::POWER_CONFIGURATION, ATTR_BATTERY_PERCENT) => u32::try_from(raw)
            .ok()
            .and_then(zigsense_battery::percent_from_half_percent)
            .map(Reading::BatteryPercent)
            .ok_or_else(|| out_of_range(0, 200)),
        (cluster::TEMPERATURE, ATTR_MEASURED_VALUE) => {
            if raw == TEMPERATURE_INVALID {
                return Err(out_of_range(-27315, 32767));
            }
            Ok(Reading::measurement(TEMPERATURE_CAPABILITY, raw as f64 / 100.0))
        },
        (cluster::HUMIDITY, ATTR_MEASURED_VALUE) => {
            if !(0..=10000).contains(&raw) || raw == HUMIDITY_INVALID {
                return Err(out_of_range(0, 10000));
            }
            Ok(Reading::measurement("measure_humidity", raw as f64 / 100.0))
        },
        (cluster::ILLUMINANCE, ATTR_MEASURED_VALUE) => {
            if !(0..=0xFFFE).contains(&raw) {
                return Err(out_of_range(0, 0xFFFE));
            }
            Ok(Reading::measurement("measure_luminance", lux_from_raw(raw)))
        },
        (cluster::OCCUPANCY, ATTR_OCCUPANCY) => {
            let occupied = match record.value {
                ZclValue::Bool(b) => b,
                other => other.as_i64() & 0x01 != 0,
            };
            Ok(Reading::alarm("alarm_motion", occupied))
        },
        _ => Err(RouteError::Unmapped { key }),
    }
}

/// Illuminance measured value is `10000 * log10(lux) + 1`
fn lux_from_raw(raw: i64) -> f64 {
    if raw <= 0 {
        return 0.0;
    }
    let lux = 10f64.powf((raw - 1) as f64 / 10000.0);
    (lux * 10.0).round() / 10.0
}

/// IAS zone status to a single alarm edge on the device's zone source
///
/// Either alarm bit raises the alarm; some zones only ever set alarm2.
pub fn route_zone_status(status: ZoneStatus, profile: &DeviceProfile) -> Reading {
    if status.battery_low() {
        debug!(device = %profile.device_id, "Zone reports low battery");
    }
    Reading::alarm(
        profile.zone_source.as_str(),
        status.alarm1() || status.alarm2(),
    )
}
