//! Piecewise-linear discharge curves

use std::borrow::Cow;

use errors::{ErrorCategory, SenseError, SenseErrorTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chemistry::Chemistry;

/// One calibration point: cell voltage and the charge it corresponds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub mv: u32,
    pub percent: u8,
}

const fn pt(mv: u32, percent: u8) -> CurvePoint {
    CurvePoint { mv, percent }
}

// Vendor-observed discharge tables, highest voltage first

const COIN_CELL: &[CurvePoint] = &[
    pt(3000, 100),
    pt(2900, 90),
    pt(2800, 75),
    pt(2750, 60),
    pt(2700, 45),
    pt(2600, 28),
    pt(2500, 15),
    pt(2400, 8),
    pt(2300, 4),
    pt(2200, 2),
    pt(2000, 0),
];

const ALKALINE_SINGLE: &[CurvePoint] = &[
    pt(1650, 100),
    pt(1550, 95),
    pt(1500, 90),
    pt(1450, 80),
    pt(1400, 70),
    pt(1350, 60),
    pt(1300, 50),
    pt(1250, 40),
    pt(1200, 30),
    pt(1150, 20),
    pt(1100, 12),
    pt(1050, 6),
    pt(1000, 3),
    pt(900, 0),
];

const ALKALINE_DOUBLE: &[CurvePoint] = &[
    pt(3300, 100),
    pt(3100, 95),
    pt(3000, 90),
    pt(2900, 80),
    pt(2800, 70),
    pt(2700, 60),
    pt(2600, 50),
    pt(2500, 40),
    pt(2400, 30),
    pt(2300, 20),
    pt(2200, 12),
    pt(2000, 5),
    pt(1800, 0),
];

const ALKALINE_QUAD: &[CurvePoint] = &[
    pt(6600, 100),
    pt(6200, 95),
    pt(6000, 90),
    pt(5800, 80),
    pt(5600, 70),
    pt(5400, 60),
    pt(5200, 50),
    pt(5000, 40),
    pt(4800, 30),
    pt(4600, 20),
    pt(4400, 12),
    pt(4000, 5),
    pt(3600, 0),
];

const LITHIUM_ION: &[CurvePoint] = &[
    pt(4200, 100),
    pt(4150, 98),
    pt(4100, 95),
    pt(4000, 88),
    pt(3900, 78),
    pt(3800, 65),
    pt(3700, 50),
    pt(3600, 35),
    pt(3500, 22),
    pt(3400, 12),
    pt(3300, 5),
    pt(3000, 2),
    pt(2800, 0),
];

const LITHIUM_POLYMER: &[CurvePoint] = &[
    pt(4200, 100),
    pt(4150, 97),
    pt(4100, 93),
    pt(4000, 85),
    pt(3900, 73),
    pt(3800, 58),
    pt(3700, 42),
    pt(3600, 28),
    pt(3500, 16),
    pt(3400, 8),
    pt(3300, 3),
    pt(3000, 0),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("Discharge curve needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("Discharge curve must start at 100%, starts at {0}%")]
    BadFirstPoint(u8),

    #[error("Discharge curve must end at 0%, ends at {0}%")]
    BadLastPoint(u8),

    #[error("Discharge curve not strictly decreasing at index {index}")]
    NotMonotonic { index: usize },
}

impl SenseErrorTrait for CurveError {
    fn error_code(&self) -> &'static str {
        "INVALID_DISCHARGE_CURVE"
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl From<CurveError> for SenseError {
    fn from(err: CurveError) -> Self {
        SenseError::InvalidConfig {
            field: "curve".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Ordered `(millivolts, percent)` table, strictly decreasing in both
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DischargeCurve {
    points: Cow<'static, [CurvePoint]>,
}

impl DischargeCurve {
    /// Validate and build a custom curve
    pub fn new(points: Vec<CurvePoint>) -> Result<Self, CurveError> {
        validate(&points)?;
        Ok(Self {
            points: Cow::Owned(points),
        })
    }

    /// Builtin curve for a chemistry; `Unknown` maps to the coin-cell table
    pub fn builtin(chemistry: Chemistry) -> Self {
        let points = match chemistry {
            Chemistry::CoinCellLithium | Chemistry::Unknown => COIN_CELL,
            Chemistry::AlkalineSingleCell => ALKALINE_SINGLE,
            Chemistry::AlkalineDoubleCell => ALKALINE_DOUBLE,
            Chemistry::AlkalineQuadCell => ALKALINE_QUAD,
            Chemistry::LithiumIon => LITHIUM_ION,
            Chemistry::LithiumPolymer => LITHIUM_POLYMER,
        };
        Self {
            points: Cow::Borrowed(points),
        }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Interpolated charge at `mv`, rounded and clamped to `0..=100`
    pub fn percent_at(&self, mv: u32) -> u8 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0,
        };
        if mv >= first.mv {
            return first.percent.min(100);
        }
        if mv <= last.mv {
            return 0;
        }

        for pair in self.points.windows(2) {
            let (high, low) = (pair[0], pair[1]);
            if mv <= high.mv && mv >= low.mv {
                let span_mv = f64::from(high.mv - low.mv);
                let span_pct = f64::from(high.percent) - f64::from(low.percent);
                let p = f64::from(low.percent) + f64::from(mv - low.mv) / span_mv * span_pct;
                return p.round().clamp(0.0, 100.0) as u8;
            }
        }
        0
    }
}

fn validate(points: &[CurvePoint]) -> Result<(), CurveError> {
    if points.len() < 2 {
        return Err(CurveError::TooFewPoints(points.len()));
    }
    if points[0].percent != 100 {
        return Err(CurveError::BadFirstPoint(points[0].percent));
    }
    let last = points[points.len() - 1].percent;
    if last != 0 {
        return Err(CurveError::BadLastPoint(last));
    }
    for (i, pair) in points.windows(2).enumerate() {
        if pair[1].mv >= pair[0].mv || pair[1].percent >= pair[0].percent {
            return Err(CurveError::NotMonotonic { index: i + 1 });
        }
    }
    Ok(())
}

/// Calibration temperature of the builtin curves
pub const REFERENCE_CELSIUS: f64 = 20.0;

/// Charge estimate for `mv` on the chemistry's builtin curve
///
/// `Unknown` chemistry is resolved from the voltage band first.
pub fn percent_from_millivolts(mv: u32, chemistry: Chemistry) -> u8 {
    DischargeCurve::builtin(chemistry.resolve(mv)).percent_at(mv)
}

/// Lift a cold reading back to what the cell would show at 20 °C
///
/// Readings at or above the reference temperature are left alone.
pub fn compensate_for_temperature(mv: u32, chemistry: Chemistry, celsius: f64) -> u32 {
    if !celsius.is_finite() || celsius >= REFERENCE_CELSIUS {
        return mv;
    }
    let drift = chemistry.temp_coeff_mv_per_c() * (REFERENCE_CELSIUS - celsius);
    (f64::from(mv) - drift).round().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// [`percent_from_millivolts`] with the ambient temperature taken into account
pub fn percent_from_millivolts_at(mv: u32, chemistry: Chemistry, celsius: Option<f64>) -> u8 {
    let chemistry = chemistry.resolve(mv);
    let mv = celsius.map_or(mv, |t| compensate_for_temperature(mv, chemistry, t));
    DischargeCurve::builtin(chemistry).percent_at(mv)
}
