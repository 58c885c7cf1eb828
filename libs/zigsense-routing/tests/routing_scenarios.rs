//! Wire bytes through decode and routing

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use zigsense_battery::Chemistry;
use zigsense_codec::{decode, tuya, zcl::ZclHeader, Datapoint, TuyaCommand, TuyaMessage};
use zigsense_routing::{route, DeviceProfile, Reading, RoutingPolicy, Semantic, VoltageUnit};

fn route_all(bytes: &[u8], profile: &mut DeviceProfile) -> Vec<Reading> {
    decode(bytes)
        .unwrap()
        .iter()
        .filter_map(|dp| route(dp, profile))
        .collect()
}

#[test]
fn battery_and_alarm_in_one_report_stay_separate() {
    let mut profile = DeviceProfile::new("a4c138", 0);
    let frame = tuya::encode_data_frame(
        TuyaCommand::DataReport,
        1,
        7,
        &[Datapoint::bool(1, true), Datapoint::value(4, 50)],
    );
    let (header, body) = ZclHeader::parse(&frame).unwrap();
    let TuyaMessage::Datapoints { datapoints, .. } =
        tuya::decode_message(header.command, body).unwrap()
    else {
        panic!("expected datapoints");
    };

    let readings: Vec<Reading> = datapoints
        .iter()
        .filter_map(|dp| route(dp, &mut profile))
        .collect();
    assert_eq!(
        readings,
        vec![
            Reading::alarm("alarm_generic", true),
            Reading::BatteryPercent(50)
        ]
    );
}

#[test]
fn inverted_firmware_variant_via_policy() {
    let policy = RoutingPolicy::new(
        [1],
        [(4, "alarm_contact".to_string())],
        [(35, VoltageUnit::Decivolts)],
    )
    .unwrap();
    let mut profile = DeviceProfile::new("tz3000", 0)
        .with_policy(Arc::new(policy))
        .with_chemistry(Chemistry::AlkalineDoubleCell);

    assert_eq!(
        route_all(&[0x01, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x32], &mut profile),
        vec![Reading::BatteryPercent(50)]
    );
    assert_eq!(
        route_all(&[0x04, 0x01, 0x00, 0x01, 0x01], &mut profile),
        vec![Reading::alarm("alarm_contact", true)]
    );
    // 30 decivolts on two alkaline cells
    assert_eq!(
        route_all(&[0x23, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x1E], &mut profile),
        vec![Reading::BatteryPercent(90)]
    );
}

#[test]
fn unknown_ids_only_count_failures() {
    let mut profile = DeviceProfile::new("a4c138", 0).with_override(
        102,
        Semantic::Measurement {
            capability: "measure_humidity".into(),
            divisor: 1.0,
        },
    );
    let readings = route_all(
        &[
            0x66, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x2D, // DP102 = 45
            0x30, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, // DP48 unmapped
        ],
        &mut profile,
    );
    assert_eq!(readings, vec![Reading::measurement("measure_humidity", 45.0)]);
    assert_eq!(profile.routing_failures(), 1);
}
