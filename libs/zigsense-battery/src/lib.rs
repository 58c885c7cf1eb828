//! Battery charge estimation
//!
//! Raw cell voltage is mapped to a percentage through piecewise-linear
//! discharge curves, one per cell chemistry. Curves are static data; custom
//! curves are validated on construction and rejected when interpolation
//! would be undefined.

pub mod chemistry;
pub mod curve;
pub mod drain;
pub mod status;

pub use chemistry::Chemistry;
pub use curve::{
    compensate_for_temperature, percent_from_millivolts, percent_from_millivolts_at, CurveError,
    CurvePoint, DischargeCurve, REFERENCE_CELSIUS,
};
pub use drain::{DrainEstimate, DrainEstimator};
pub use status::BatteryStatus;

/// Convert a ZCL half-percent reading (`0..=200`) to whole percent
///
/// Halves round up so that 199 reads as 100 and 1 reads as 1.
pub fn percent_from_half_percent(raw: u32) -> Option<u8> {
    if raw > 200 {
        return None;
    }
    Some(raw.div_ceil(2) as u8)
}
