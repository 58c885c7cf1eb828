//! Configuration file loading
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::io::Write;

use ingestsrv::{EngineConfig, IngestError};
use tempfile::NamedTempFile;
use zigsense_battery::Chemistry;
use zigsense_routing::{Semantic, VoltageUnit};

fn write_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const YAML: &str = r#"
service:
  name: ingestsrv-test
debounce:
  window_ms: 1500
device_classes:
  climate:
    chemistry: alkaline_double_cell
    liveness_warn_hours: 6
    liveness_hard_hours: 12
    dp_semantic_overrides:
      "102":
        measurement:
          capability: measure_temperature
          divisor: 10
      "9": ignore
    policy:
      hard_battery: [4]
      voltage:
        "21": centivolts
devices:
  - id: a4c138
    class: climate
    endpoints:
      - endpoint: 1
        input_clusters: [61184]
"#;

#[test]
fn test_load_yaml() {
    let file = write_config(".yaml", YAML);
    let config = EngineConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.service.name, "ingestsrv-test");
    assert_eq!(config.debounce.window_ms, 1500);
    // Untouched sections keep their defaults
    assert_eq!(config.debounce.auto_clear_ms, 60_000);
    assert_eq!(config.liveness.tick_secs, 3600);

    let class = config.device_class("climate").unwrap();
    assert_eq!(class.chemistry, Chemistry::AlkalineDoubleCell);
    assert_eq!(class.thresholds.warn_ms, 6 * 3_600_000);
    assert_eq!(
        class.overrides.get(&102),
        Some(&Semantic::Measurement {
            capability: "measure_temperature".into(),
            divisor: 10.0
        })
    );
    assert_eq!(class.overrides.get(&9), Some(&Semantic::Ignore));
    assert_eq!(class.policy.voltage_unit(21), Some(VoltageUnit::Centivolts));
    assert!(class.policy.context_source(1).is_none());

    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].endpoints[0].input_clusters, vec![0xEF00]);
}

#[test]
fn test_load_json() {
    let file = write_config(
        ".json",
        r#"{"liveness": {"tick_secs": 60}, "device_classes": {"button": {"liveness_warn_hours": 72, "liveness_hard_hours": 168}}}"#,
    );
    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.liveness.tick_secs, 60);
    assert!(config.device_class("button").is_ok());
}

#[test]
fn test_invalid_thresholds_rejected_at_load() {
    let file = write_config(
        ".yaml",
        "device_classes:\n  bad:\n    liveness_warn_hours: 48\n    liveness_hard_hours: 48\n",
    );
    assert!(matches!(
        EngineConfig::load(Some(file.path())),
        Err(IngestError::InvalidConfig { .. })
    ));
}

#[test]
fn test_unknown_class_referenced() {
    let file = write_config(
        ".yaml",
        "devices:\n  - id: a4c138\n    class: ghost\n",
    );
    assert!(matches!(
        EngineConfig::load(Some(file.path())),
        Err(IngestError::UnknownDeviceClass(_))
    ));
}

#[test]
fn test_unsupported_extension_and_missing_file() {
    let file = write_config(".ini", "[service]\n");
    assert!(matches!(
        EngineConfig::load(Some(file.path())),
        Err(IngestError::Config(_))
    ));
    assert!(EngineConfig::load(Some(std::path::Path::new("/nonexistent/ingestsrv.yaml"))).is_err());
}

#[test]
fn test_bundled_example_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/ingestsrv.yaml");
    let config = EngineConfig::load(Some(&path)).unwrap();
    assert_eq!(config.devices.len(), 2);
    let leak = config.device_class("water_leak").unwrap();
    assert_eq!(leak.zone_id, 23);
    assert_eq!(leak.zone_source, "alarm_water");
    let button = config.device_class("scene_button").unwrap();
    assert_eq!(button.chemistry, Chemistry::CoinCellLithium);
}
