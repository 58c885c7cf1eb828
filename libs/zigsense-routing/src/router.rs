//! Datapoint router
//!
//! Evaluation order is fixed: hard-battery ids, context-dependent ids,
//! voltage ids, then per-device overrides. Each stage returns as soon as it
//! claims an id, so battery and alarm interpretations never compete for the
//! same datapoint.

use tracing::{debug, warn};
use zigsense_codec::{Datapoint, DpValue};

use crate::error::{RouteError, RouteKey};
use crate::policy::VoltageUnit;
use crate::profile::DeviceProfile;
use crate::reading::Reading;
use crate::semantic::Semantic;

/// Lowest cell voltage considered a real measurement
pub const MIN_PLAUSIBLE_MV: i64 = 500;

/// Route one datapoint, logging and counting anything that is discarded
///
/// Accepted readings are fed back into the profile: a voltage pins an
/// unconfigured chemistry, a temperature feeds battery compensation.
pub fn route(dp: &Datapoint, profile: &mut DeviceProfile) -> Option<Reading> {
    match classify(dp, profile) {
        Ok(reading) => {
            if let Some(reading) = &reading {
                if let Some(unit) = profile.policy.voltage_unit(dp.id()) {
                    if let Ok(mv) = cell_millivolts(RouteKey::Dp(dp.id()), dp, unit) {
                        profile.lock_chemistry(mv);
                    }
                }
                profile.observe(reading);
            }
            reading
        },
        Err(e @ RouteError::Unmapped { .. }) => {
            debug!(device = %profile.device_id, "Discarded: {}", e);
            profile.record_routing_failure();
            None
        },
        Err(e) => {
            warn!(device = %profile.device_id, "Discarded: {}", e);
            profile.record_routing_failure();
            None
        },
    }
}

/// Pure routing decision
///
/// `Ok(None)` means the id is deliberately ignored.
pub fn classify(dp: &Datapoint, profile: &DeviceProfile) -> Result<Option<Reading>, RouteError> {
    let id = dp.id();
    let key = RouteKey::Dp(id);
    let value = dp.value_view();
    let policy = &profile.policy;

    if policy.is_hard_battery(id) {
        return battery_percent(key, dp, &value).map(Some);
    }

    if let Some(source) = policy.context_source(id) {
        return context_dependent(key, source, &value).map(Some);
    }

    if let Some(unit) = policy.voltage_unit(id) {
        let mv = cell_millivolts(key, dp, unit)?;
        return Ok(Some(Reading::BatteryPercent(
            profile.percent_for_millivolts(mv),
        )));
    }

    match profile.dp_semantic_overrides.get(&id) {
        Some(semantic) => apply_semantic(key, dp, &value, semantic),
        None => Err(RouteError::Unmapped { key }),
    }
}

/// Cell voltage carried by a voltage-class datapoint
fn cell_millivolts(key: RouteKey, dp: &Datapoint, unit: VoltageUnit) -> Result<u32, RouteError> {
    let raw = match dp.value_view() {
        DpValue::Value(v) => i64::from(v),
        _ => {
            return Err(RouteError::TypeMismatch {
                key,
                expected: "value",
                found: dp.dp_type(),
            })
        },
    };
    let mv = unit.to_millivolts(raw);
    if mv < MIN_PLAUSIBLE_MV {
        return Err(RouteError::OutOfRange {
            key,
            value: mv,
            min: MIN_PLAUSIBLE_MV,
            max: i64::from(u32::MAX),
        });
    }
    Ok(u32::try_from(mv).unwrap_or(u32::MAX))
}

/// Integer payload of a numeric datapoint, rejecting booleans and blobs
fn integer(key: RouteKey, dp: &Datapoint, value: &DpValue<'_>) -> Result<i64, RouteError> {
    match value {
        DpValue::Value(v) => Ok(i64::from(*v)),
        DpValue::Enum(v) => Ok(i64::from(*v)),
        _ => Err(RouteError::TypeMismatch {
            key,
            expected: "numeric",
            found: dp.dp_type(),
        }),
    }
}

/// Coerce a charge report: `0..=100` as is, `101..=200` as half-percent
fn battery_percent(
    key: RouteKey,
    dp: &Datapoint,
    value: &DpValue<'_>,
) -> Result<Reading, RouteError> {
    let raw = integer(key, dp, value)?;
    let percent = match raw {
        0..=100 => Some(raw as u8),
        101..=200 => zigsense_battery::percent_from_half_percent(raw as u32),
        _ => None,
    };
    percent
        .map(Reading::BatteryPercent)
        .ok_or(RouteError::OutOfRange {
            key,
            value: raw,
            min: 0,
            max: 200,
        })
}

fn context_dependent(
    key: RouteKey,
    source: &str,
    value: &DpValue<'_>,
) -> Result<Reading, RouteError> {
    match value {
        DpValue::Value(v @ 0..=100) => Ok(Reading::BatteryPercent(*v as u8)),
        DpValue::Bool(true) => Ok(Reading::alarm(source, true)),
        DpValue::Value(v) => Err(RouteError::Ambiguous {
            key,
            reason: format!("numeric {} is neither a percentage nor an alarm", v),
        }),
        DpValue::Bool(false) => Err(RouteError::Ambiguous {
            key,
            reason: "false carries no alarm edge and is not a charge level".to_string(),
        }),
        DpValue::Enum(v) => Err(RouteError::Ambiguous {
            key,
            reason: format!("enum {} has no defined meaning here", v),
        }),
        other => Err(RouteError::Ambiguous {
            key,
            reason: format!("unsupported payload {:?}", other),
        }),
    }
}

fn apply_semantic(
    key: RouteKey,
    dp: &Datapoint,
    value: &DpValue<'_>,
    semantic: &Semantic,
) -> Result<Option<Reading>, RouteError> {
    let reading = match semantic {
        Semantic::Battery => battery_percent(key, dp, value)?,
        Semantic::BatteryState => {
            let step = integer(key, dp, value)?;
            let percent = usize::try_from(step)
                .ok()
                .and_then(|i| Semantic::BATTERY_STATE_PERCENT.get(i).copied())
                .ok_or(RouteError::OutOfRange {
                    key,
                    value: step,
                    min: 0,
                    max: 2,
                })?;
            Reading::BatteryPercent(percent)
        },
        Semantic::Measurement {
            capability,
            divisor,
        } => {
            let raw = integer(key, dp, value)?;
            Reading::measurement(capability.as_str(), raw as f64 / divisor)
        },
        Semantic::Alarm { source, invert } => {
            let active = match value {
                DpValue::Bool(b) => *b,
                _ => integer(key, dp, value)? != 0,
            };
            Reading::alarm(source.as_str(), active ^ invert)
        },
        Semantic::Command { name } => {
            let raw = match value {
                DpValue::Bool(b) => i64::from(*b),
                _ => integer(key, dp, value)?,
            };
            Reading::command(name.as_str(), raw)
        },
        Semantic::Ignore => return Ok(None),
        Semantic::Unknown(_) => return Err(RouteError::Unmapped { key }),
    };
    Ok(Some(reading))
}
