//! Engine configuration
//!
//! Sources merged with figment, lowest priority first:
//! 1. Built-in defaults
//! 2. A YAML / TOML / JSON file
//! 3. `INGESTSRV_` environment variables (`__` separates nesting levels,
//!    e.g. `INGESTSRV_DEBOUNCE__WINDOW_MS=500`)
//!
//! Device classes are validated before any device can be initialised, and a
//! device's settings are fixed for its lifetime once it is.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use common::LogConfig;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zigsense_battery::{Chemistry, CurvePoint, DischargeCurve};
use zigsense_codec::zcl::ias::DEFAULT_ZONE_ID;
use zigsense_routing::{DeviceProfile, RoutingPolicy, Semantic, VoltageUnit};

use crate::error::{IngestError, Result};
use crate::liveness::LivenessThresholds;
use crate::negotiation::EndpointDescriptor;

pub const ENV_PREFIX: &str = "INGESTSRV_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    /// Per device class settings, keyed by class name
    #[serde(default)]
    pub device_classes: BTreeMap<String, DeviceConfig>,
    /// Devices the replay binary initialises at startup
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            logging: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Seconds between liveness sweeps
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_auto_clear_ms")]
    pub auto_clear_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            auto_clear_ms: default_auto_clear_ms(),
        }
    }
}

/// Settings shared by every device of one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub chemistry: Chemistry,
    /// Kind of device (`button`, `climate`, `lock`, ...), used to pick the
    /// usual cell when `chemistry` is left unset
    #[serde(default)]
    pub device_type: Option<String>,
    /// Datapoint id (as a string key) to meaning
    #[serde(default)]
    pub dp_semantic_overrides: BTreeMap<String, Semantic>,
    #[serde(default = "default_warn_hours")]
    pub liveness_warn_hours: u32,
    #[serde(default = "default_hard_hours")]
    pub liveness_hard_hours: u32,
    /// Replaces the default id classes when present
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
    #[serde(default = "default_zone_id")]
    pub zone_id: u8,
    #[serde(default = "default_zone_source")]
    pub zone_source: String,
    /// Custom discharge curve, highest voltage first
    #[serde(default)]
    pub curve: Option<Vec<CurvePoint>>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            chemistry: Chemistry::default(),
            device_type: None,
            dp_semantic_overrides: BTreeMap::new(),
            liveness_warn_hours: default_warn_hours(),
            liveness_hard_hours: default_hard_hours(),
            policy: None,
            zone_id: default_zone_id(),
            zone_source: default_zone_source(),
            curve: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub hard_battery: Vec<u8>,
    /// Datapoint id to the alarm source it maps to when boolean
    #[serde(default)]
    pub context_dependent: BTreeMap<String, String>,
    #[serde(default)]
    pub voltage: BTreeMap<String, VoltageUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub class: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointDescriptor>,
}

fn default_service_name() -> String {
    "ingestsrv".to_string()
}

fn default_tick_secs() -> u64 {
    3600
}

fn default_window_ms() -> u64 {
    2000
}

fn default_auto_clear_ms() -> u64 {
    60_000
}

fn default_warn_hours() -> u32 {
    24
}

fn default_hard_hours() -> u32 {
    48
}

fn default_zone_id() -> u8 {
    DEFAULT_ZONE_ID
}

fn default_zone_source() -> String {
    "alarm_contact".to_string()
}

fn parse_dp_id(field: &str, key: &str) -> Result<u8> {
    key.trim()
        .parse::<u8>()
        .map_err(|_| IngestError::invalid_config(field, format!("'{}' is not a datapoint id", key)))
}

impl PolicyConfig {
    pub fn build(&self, class: &str) -> Result<RoutingPolicy> {
        let field = format!("device_classes.{}.policy", class);
        let context = self
            .context_dependent
            .iter()
            .map(|(k, source)| Ok((parse_dp_id(&field, k)?, source.clone())))
            .collect::<Result<Vec<_>>>()?;
        let voltage = self
            .voltage
            .iter()
            .map(|(k, unit)| Ok((parse_dp_id(&field, k)?, *unit)))
            .collect::<Result<Vec<_>>>()?;
        Ok(RoutingPolicy::new(
            self.hard_battery.iter().copied(),
            context,
            voltage,
        )?)
    }
}

/// A device class after validation, ready to stamp out profiles
#[derive(Debug, Clone)]
pub struct ResolvedClass {
    pub name: String,
    pub chemistry: Chemistry,
    pub overrides: HashMap<u8, Semantic>,
    pub policy: Arc<RoutingPolicy>,
    pub curve: Option<DischargeCurve>,
    pub thresholds: LivenessThresholds,
    pub zone_id: u8,
    pub zone_source: String,
}

impl ResolvedClass {
    pub fn build_profile(&self, device_id: &str, now: i64) -> DeviceProfile {
        let mut profile = DeviceProfile::new(device_id, now)
            .with_chemistry(self.chemistry)
            .with_policy(Arc::clone(&self.policy));
        profile.dp_semantic_overrides = self.overrides.clone();
        profile.custom_curve = self.curve.clone();
        profile.zone_source = self.zone_source.clone();
        profile
    }
}

impl DeviceConfig {
    /// Validate and resolve this class
    pub fn resolve(&self, class: &str) -> Result<ResolvedClass> {
        let prefix = format!("device_classes.{}", class);

        if self.liveness_warn_hours == 0 || self.liveness_hard_hours == 0 {
            return Err(IngestError::invalid_config(
                format!("{}.liveness", prefix),
                "thresholds must be non-zero",
            ));
        }
        if self.liveness_warn_hours >= self.liveness_hard_hours {
            return Err(IngestError::invalid_config(
                format!("{}.liveness", prefix),
                format!(
                    "warn ({}h) must be below hard ({}h)",
                    self.liveness_warn_hours, self.liveness_hard_hours
                ),
            ));
        }
        if self.zone_source.trim().is_empty() {
            return Err(IngestError::invalid_config(
                format!("{}.zone_source", prefix),
                "must not be empty",
            ));
        }

        let chemistry = match (self.chemistry, &self.device_type) {
            (Chemistry::Unknown, Some(kind)) => Chemistry::for_device_type(kind).ok_or_else(|| {
                IngestError::invalid_config(
                    format!("{}.device_type", prefix),
                    format!("no default chemistry for '{}'", kind),
                )
            })?,
            (explicit, _) => explicit,
        };

        let overrides_field = format!("{}.dp_semantic_overrides", prefix);
        let mut overrides = HashMap::with_capacity(self.dp_semantic_overrides.len());
        for (key, semantic) in &self.dp_semantic_overrides {
            let id = parse_dp_id(&overrides_field, key)?;
            match semantic {
                Semantic::Measurement { divisor, .. } if *divisor == 0.0 || !divisor.is_finite() => {
                    return Err(IngestError::invalid_config(
                        &overrides_field,
                        format!("DP {} divisor must be a non-zero number", id),
                    ));
                },
                Semantic::Alarm { source, .. } | Semantic::Command { name: source }
                    if source.trim().is_empty() =>
                {
                    return Err(IngestError::invalid_config(
                        &overrides_field,
                        format!("DP {} has an empty name", id),
                    ));
                },
                _ => {},
            }
            overrides.insert(id, semantic.clone());
        }

        let policy = match &self.policy {
            Some(p) => p.build(class)?,
            None => RoutingPolicy::default(),
        };
        for id in overrides.keys().filter(|id| policy.claims(**id)) {
            debug!("Class {}: override for DP {} shadowed by routing policy", class, id);
        }

        let curve = self
            .curve
            .as_ref()
            .map(|points| DischargeCurve::new(points.clone()))
            .transpose()?;

        Ok(ResolvedClass {
            name: class.to_string(),
            chemistry,
            overrides,
            policy: Arc::new(policy),
            curve,
            thresholds: LivenessThresholds::from_hours(
                self.liveness_warn_hours,
                self.liveness_hard_hours,
            ),
            zone_id: self.zone_id,
            zone_source: self.zone_source.clone(),
        })
    }
}

impl EngineConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(IngestError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .ok_or_else(|| IngestError::Config("Config file must have an extension".into()))?;
            figment = match extension {
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                "json" => figment.merge(Json::file(path)),
                other => {
                    return Err(IngestError::Config(format!(
                        "Unsupported config file format: {}",
                        other
                    )))
                },
            };
        }

        let config: EngineConfig = figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section that can be checked without a device
    pub fn validate(&self) -> Result<()> {
        if self.liveness.tick_secs == 0 {
            return Err(IngestError::invalid_config(
                "liveness.tick_secs",
                "must be greater than 0",
            ));
        }
        if self.debounce.auto_clear_ms == 0 {
            return Err(IngestError::invalid_config(
                "debounce.auto_clear_ms",
                "must be greater than 0",
            ));
        }
        for (name, class) in &self.device_classes {
            class.resolve(name)?;
        }
        for entry in &self.devices {
            if !self.device_classes.contains_key(&entry.class) {
                return Err(IngestError::UnknownDeviceClass(entry.class.clone()));
            }
        }
        Ok(())
    }

    pub fn device_class(&self, name: &str) -> Result<ResolvedClass> {
        self.device_classes
            .get(name)
            .ok_or_else(|| IngestError::UnknownDeviceClass(name.to_string()))?
            .resolve(name)
    }
}
