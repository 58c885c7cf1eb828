use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::curve::DischargeCurve;

/// Above any single lithium cell; only a four-cell alkaline pack gets here
const INFER_QUAD_CELL_ABOVE_MV: u32 = 4500;
/// Upper bound of the coin-cell band; anything above is treated as lithium-ion
const INFER_LITHIUM_ION_ABOVE_MV: u32 = 3500;
/// Lower bound of the coin-cell band; anything below is a single alkaline cell
const INFER_SINGLE_CELL_BELOW_MV: u32 = 1800;

/// Battery cell technology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chemistry {
    /// CR2032 / CR2450 lithium coin cells
    CoinCellLithium,
    /// One AA/AAA alkaline cell
    AlkalineSingleCell,
    /// Two AA/AAA alkaline cells in series
    AlkalineDoubleCell,
    /// Four AAA alkaline cells in series, as in door locks
    AlkalineQuadCell,
    LithiumIon,
    LithiumPolymer,
    /// Not configured; inferred from the observed voltage
    #[default]
    Unknown,
}

impl Chemistry {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoinCellLithium => "coin_cell_lithium",
            Self::AlkalineSingleCell => "alkaline_single_cell",
            Self::AlkalineDoubleCell => "alkaline_double_cell",
            Self::AlkalineQuadCell => "alkaline_quad_cell",
            Self::LithiumIon => "lithium_ion",
            Self::LithiumPolymer => "lithium_polymer",
            Self::Unknown => "unknown",
        }
    }

    /// Heuristic classification by voltage band
    ///
    /// Only a fallback for unconfigured devices; never overrides an
    /// explicit chemistry.
    pub fn infer_from_millivolts(mv: u32) -> Self {
        if mv > INFER_QUAD_CELL_ABOVE_MV {
            Self::AlkalineQuadCell
        } else if mv > INFER_LITHIUM_ION_ABOVE_MV {
            Self::LithiumIon
        } else if mv < INFER_SINGLE_CELL_BELOW_MV {
            Self::AlkalineSingleCell
        } else {
            Self::CoinCellLithium
        }
    }

    /// The configured chemistry, or the inferred one when unknown
    pub fn resolve(self, mv: u32) -> Self {
        match self {
            Self::Unknown => {
                let inferred = Self::infer_from_millivolts(mv);
                debug!("Chemistry inferred from {} mV: {}", mv, inferred.as_str());
                inferred
            },
            explicit => explicit,
        }
    }

    /// Voltage drift per degree Celsius below 20 °C, in millivolts
    ///
    /// Negative: cold cells read low. Multi-cell packs scale with the cell
    /// count.
    pub fn temp_coeff_mv_per_c(self) -> f64 {
        match self {
            Self::CoinCellLithium | Self::Unknown => -3.0,
            Self::AlkalineSingleCell => -4.0,
            Self::AlkalineDoubleCell => -8.0,
            Self::AlkalineQuadCell => -16.0,
            Self::LithiumIon | Self::LithiumPolymer => -2.0,
        }
    }

    /// Usual cell for a kind of device, when the class names one
    pub fn for_device_type(device_type: &str) -> Option<Self> {
        let chemistry = match device_type.trim().to_ascii_lowercase().as_str() {
            "button" | "remote" | "scene_switch" | "smart_knob" | "motion" | "pir"
            | "temperature" | "humidity" | "contact" | "door" | "window" | "vibration"
            | "water" | "leak" | "smoke" | "sos" => Self::CoinCellLithium,
            "climate" | "soil" | "trv" | "thermostat" | "siren" => Self::AlkalineDoubleCell,
            "lock" => Self::AlkalineQuadCell,
            "radar" | "presence" | "air_quality" | "gas" => Self::LithiumIon,
            _ => return None,
        };
        Some(chemistry)
    }

    /// Builtin discharge curve for this chemistry
    ///
    /// `Unknown` has no curve of its own; callers resolve it first.
    pub fn curve(self) -> DischargeCurve {
        DischargeCurve::builtin(self)
    }
}

impl std::fmt::Display for Chemistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_inference_bands() {
        assert_eq!(Chemistry::infer_from_millivolts(6200), Chemistry::AlkalineQuadCell);
        assert_eq!(Chemistry::infer_from_millivolts(4500), Chemistry::LithiumIon);
        assert_eq!(Chemistry::infer_from_millivolts(4100), Chemistry::LithiumIon);
        assert_eq!(Chemistry::infer_from_millivolts(3501), Chemistry::LithiumIon);
        assert_eq!(Chemistry::infer_from_millivolts(3500), Chemistry::CoinCellLithium);
        assert_eq!(Chemistry::infer_from_millivolts(2900), Chemistry::CoinCellLithium);
        assert_eq!(Chemistry::infer_from_millivolts(1800), Chemistry::CoinCellLithium);
        assert_eq!(Chemistry::infer_from_millivolts(1799), Chemistry::AlkalineSingleCell);
    }

    #[test]
    fn test_explicit_chemistry_wins() {
        assert_eq!(
            Chemistry::AlkalineDoubleCell.resolve(4100),
            Chemistry::AlkalineDoubleCell
        );
        assert_eq!(Chemistry::Unknown.resolve(4100), Chemistry::LithiumIon);
    }

    #[test]
    fn test_device_type_mapping() {
        assert_eq!(Chemistry::for_device_type("button"), Some(Chemistry::CoinCellLithium));
        assert_eq!(Chemistry::for_device_type("Climate"), Some(Chemistry::AlkalineDoubleCell));
        assert_eq!(Chemistry::for_device_type("lock"), Some(Chemistry::AlkalineQuadCell));
        assert_eq!(Chemistry::for_device_type("radar"), Some(Chemistry::LithiumIon));
        assert_eq!(Chemistry::for_device_type("toaster"), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Chemistry::CoinCellLithium).unwrap();
        assert_eq!(json, "\"coin_cell_lithium\"");
        let parsed: Chemistry = serde_json::from_str("\"lithium_polymer\"").unwrap();
        assert_eq!(parsed, Chemistry::LithiumPolymer);
    }
}
