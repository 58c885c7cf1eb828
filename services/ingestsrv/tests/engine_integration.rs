//! End-to-end frame processing through the public engine API
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod support;

use std::sync::Arc;
use std::time::Duration;

use common::ManualTimeProvider;
use bytes::Bytes;
use ingestsrv::{EndpointDescriptor, EnrollmentState, IngestError, TelemetryPath};
use zigsense_codec::{cluster, Datapoint, ZclHeader};
use zigsense_routing::Reading;

use support::*;

fn setup(outcomes: &[bool]) -> (
    ingestsrv::IngestEngine,
    Arc<RecordingSink>,
    Arc<ScriptedTransmitter>,
    ManualTimeProvider,
) {
    let sink = Arc::new(RecordingSink::default());
    let transmitter = Arc::new(ScriptedTransmitter::with_outcomes(outcomes));
    let clock = ManualTimeProvider::new(T0);
    let engine = engine_with(&sink, &transmitter, &clock);
    (engine, sink, transmitter, clock)
}

#[tokio::test]
async fn test_hard_battery_dp_reports_percent() {
    let (engine, sink, _tx, _clock) = setup(&[]);
    let paths = engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();
    assert_eq!(paths.path, TelemetryPath::Tuya);

    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::value(4, 50)]))
        .unwrap();
    let diag = settle(&engine, "a4c138").await;

    assert_eq!(sink.readings("a4c138"), vec![Reading::BatteryPercent(50)]);
    assert_eq!(diag.battery_percent, Some(50));
    assert!(diag.enrollment.is_none());
    assert_eq!(diag.routing_failures, 0);
}

#[tokio::test]
async fn test_context_dependent_dp_is_battery_or_alarm() {
    let (engine, sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::bool(1, true)]))
        .unwrap();
    clock.advance(10_000);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::value(1, 80)]))
        .unwrap();
    settle(&engine, "a4c138").await;

    assert_eq!(
        sink.readings("a4c138"),
        vec![
            Reading::alarm("alarm_generic", true),
            Reading::BatteryPercent(80)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_edges_collapse_to_one_then_auto_clear() {
    let (engine, sink, _tx, _clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    // Same logical press seen on several transport paths
    for _ in 0..5 {
        engine
            .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::bool(1, true)]))
            .unwrap();
    }
    let diag = settle(&engine, "a4c138").await;
    assert_eq!(sink.alarms("a4c138"), vec![Reading::alarm("alarm_generic", true)]);
    assert_eq!(diag.auto_clear_pending, vec!["alarm_generic"]);

    tokio::time::sleep(Duration::from_millis(60_100)).await;
    let diag = settle(&engine, "a4c138").await;
    assert_eq!(
        sink.alarms("a4c138"),
        vec![
            Reading::alarm("alarm_generic", true),
            Reading::alarm("alarm_generic", false)
        ]
    );
    assert!(diag.auto_clear_pending.is_empty());

    // Nothing fires a second time
    tokio::time::sleep(Duration::from_millis(120_000)).await;
    settle(&engine, "a4c138").await;
    assert_eq!(sink.alarms("a4c138").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_newer_edge_reschedules_auto_clear() {
    let (engine, sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::bool(1, true)]))
        .unwrap();
    settle(&engine, "a4c138").await;

    tokio::time::sleep(Duration::from_millis(40_000)).await;
    clock.advance(40_000);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::bool(1, true)]))
        .unwrap();
    settle(&engine, "a4c138").await;

    // The first timer would have fired here
    tokio::time::sleep(Duration::from_millis(30_000)).await;
    settle(&engine, "a4c138").await;
    assert_eq!(sink.alarms("a4c138").len(), 2);

    tokio::time::sleep(Duration::from_millis(31_000)).await;
    settle(&engine, "a4c138").await;
    assert_eq!(
        sink.alarms("a4c138").last(),
        Some(&Reading::alarm("alarm_generic", false))
    );
    assert_eq!(sink.alarms("a4c138").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_each_alarm_source_clears_on_its_own() {
    let (engine, sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::bool(1, true)]))
        .unwrap();
    settle(&engine, "a4c138").await;

    // A second source goes active outside the debounce window
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    clock.advance(3_000);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::bool(5, true)]))
        .unwrap();
    let diag = settle(&engine, "a4c138").await;
    assert_eq!(diag.auto_clear_pending, vec!["alarm_generic", "alarm_tamper"]);

    tokio::time::sleep(Duration::from_millis(61_000)).await;
    let diag = settle(&engine, "a4c138").await;
    assert_eq!(
        sink.alarms("a4c138"),
        vec![
            Reading::alarm("alarm_generic", true),
            Reading::alarm("alarm_tamper", true),
            Reading::alarm("alarm_generic", false),
            Reading::alarm("alarm_tamper", false),
        ]
    );
    assert!(diag.auto_clear_pending.is_empty());
}

#[tokio::test]
async fn test_failed_enrollment_retried_once_on_next_alarm() {
    // Proactive send fails, the retry succeeds
    let (engine, sink, tx, clock) = setup(&[false, true]);
    let paths = engine.init_device("door-1", "door", &ias_endpoints()).unwrap();
    assert_eq!(paths.path, TelemetryPath::Zcl);
    assert_eq!(paths.ias_endpoint, Some(1));

    let diag = settle(&engine, "door-1").await;
    let enrollment = diag.enrollment.unwrap();
    assert_eq!(enrollment.state, EnrollmentState::Failed);
    assert_eq!(enrollment.attempts, 1);

    engine
        .deliver_frame("door-1", 1, cluster::IAS_ZONE, zone_status(0x0001))
        .unwrap();
    let diag = settle(&engine, "door-1").await;

    assert_eq!(sink.alarms("door-1"), vec![Reading::alarm("alarm_contact", true)]);
    let sent = tx.sent_on(cluster::IAS_ZONE);
    assert_eq!(sent.len(), 2);
    let (header, body) = ZclHeader::parse(&sent[1].payload).unwrap();
    assert_eq!(header.command, 0x00);
    assert_eq!(body, &[0x00u8, 10][..]);

    let enrollment = diag.enrollment.unwrap();
    assert_eq!(enrollment.state, EnrollmentState::Enrolled);
    assert_eq!(enrollment.attempts, 2);
    assert_eq!(enrollment.failures, 1);

    // Enrolled devices are not resent anything
    clock.advance(10_000);
    engine
        .deliver_frame("door-1", 1, cluster::IAS_ZONE, zone_status(0x0000))
        .unwrap();
    settle(&engine, "door-1").await;
    assert_eq!(tx.sent_on(cluster::IAS_ZONE).len(), 2);
}

#[tokio::test]
async fn test_alarm_delivered_even_when_retry_fails() {
    let (engine, sink, tx, _clock) = setup(&[false, false]);
    engine.init_device("door-1", "door", &ias_endpoints()).unwrap();

    engine
        .deliver_frame("door-1", 1, cluster::IAS_ZONE, zone_status(0x0001))
        .unwrap();
    let diag = settle(&engine, "door-1").await;

    assert_eq!(sink.alarms("door-1"), vec![Reading::alarm("alarm_contact", true)]);
    assert_eq!(tx.sent_on(cluster::IAS_ZONE).len(), 2);
    let enrollment = diag.enrollment.unwrap();
    assert_eq!(enrollment.state, EnrollmentState::Failed);
    assert_eq!(enrollment.failures, 2);
}

#[tokio::test]
async fn test_enrollment_retried_on_frame_outside_negotiated_paths() {
    let (engine, sink, tx, _clock) = setup(&[false, true]);
    engine.init_device("door-1", "door", &ias_endpoints()).unwrap();
    assert_eq!(
        settle(&engine, "door-1").await.enrollment.unwrap().state,
        EnrollmentState::Failed
    );

    // Basic cluster read response; not decoded, but the device is awake
    let basic = Bytes::from_static(&[0x18, 0x02, 0x01, 0x04, 0x00, 0x00, 0x42, 0x00]);
    engine.deliver_frame("door-1", 1, 0x0000, basic).unwrap();
    let diag = settle(&engine, "door-1").await;

    assert!(sink.readings("door-1").is_empty());
    assert_eq!(tx.sent_on(cluster::IAS_ZONE).len(), 2);
    assert_eq!(diag.enrollment.unwrap().state, EnrollmentState::Enrolled);
}

#[tokio::test]
async fn test_device_enroll_request_answered() {
    let (engine, _sink, tx, _clock) = setup(&[]);
    engine.init_device("door-1", "door", &ias_endpoints()).unwrap();

    // Zone Enroll Request: zone type 0x0015 (contact), manufacturer 0x1234
    let request = Bytes::from_static(&[0x19, 0x07, 0x01, 0x15, 0x00, 0x34, 0x12]);
    engine
        .deliver_frame("door-1", 1, cluster::IAS_ZONE, request)
        .unwrap();
    let diag = settle(&engine, "door-1").await;

    assert_eq!(tx.sent_on(cluster::IAS_ZONE).len(), 2);
    assert_eq!(diag.enrollment.unwrap().state, EnrollmentState::Enrolled);
}

#[tokio::test]
async fn test_negotiation_fails_closed() {
    let (engine, _sink, _tx, _clock) = setup(&[]);
    let basic_only = vec![EndpointDescriptor::new(1, [0x0000, 0x0003])];
    let err = engine
        .init_device("plug-1", "tuya_sensor", &basic_only)
        .unwrap_err();
    assert!(matches!(err, IngestError::NoSupportedPath(_)));
    assert!(engine.device_ids().is_empty());

    assert!(matches!(
        engine.deliver_frame("plug-1", 1, cluster::TUYA, Bytes::new()),
        Err(IngestError::DeviceNotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_class_and_double_init() {
    let (engine, _sink, _tx, _clock) = setup(&[]);
    assert!(matches!(
        engine.init_device("a4c138", "no_such_class", &tuya_endpoints()),
        Err(IngestError::UnknownDeviceClass(_))
    ));
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();
    assert!(matches!(
        engine.init_device("a4c138", "tuya_sensor", &tuya_endpoints()),
        Err(IngestError::AlreadyInitialised(_))
    ));
}

#[tokio::test]
async fn test_time_sync_answered() {
    let (engine, _sink, tx, _clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    let request = Bytes::from_static(&[0x19, 0x05, 0x24, 0x00, 0x01]);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, request)
        .unwrap();
    settle(&engine, "a4c138").await;

    let sent = tx.sent_on(cluster::TUYA);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].endpoint, 1);
    let (header, body) = ZclHeader::parse(&sent[0].payload).unwrap();
    assert_eq!(header.command, 0x24);
    assert_eq!(body.len(), 10);
    assert_eq!(&body[..2], &[0x00u8, 0x08][..]);
    let utc = u32::from_be_bytes([body[2], body[3], body[4], body[5]]);
    assert_eq!(i64::from(utc), T0 / 1000);
}

#[tokio::test]
async fn test_malformed_frame_counts_and_emits_nothing() {
    let (engine, sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();
    clock.advance(HOUR);

    // Second record declares 4 bytes but carries 2
    let frame = Bytes::from_static(&[
        0x19, 0x02, 0x02, 0x00, 0x01, // header + tuya seq
        0x04, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x32, // dp 4 = 50
        0x01, 0x02, 0x00, 0x04, 0x00, 0x00,
    ]);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, frame)
        .unwrap();
    // Unknown id routes nowhere
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::value(200, 7)]))
        .unwrap();
    let diag = settle(&engine, "a4c138").await;

    assert!(sink.readings("a4c138").is_empty());
    assert_eq!(diag.decode_failures, 1);
    assert_eq!(diag.routing_failures, 1);
    // Contact still counts as contact
    assert_eq!(diag.last_seen_at, T0 + HOUR);
}

#[tokio::test]
async fn test_unnegotiated_cluster_is_contact_but_not_decoded() {
    let (engine, sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();
    clock.advance(49 * HOUR);
    engine.tick();
    assert!(!settle(&engine, "a4c138").await.available);

    // Battery percent on powerConfiguration, not part of the Tuya path
    let report = Bytes::from_static(&[0x18, 0x03, 0x0A, 0x21, 0x00, 0x20, 0xC8]);
    engine
        .deliver_frame("a4c138", 1, cluster::POWER_CONFIGURATION, report)
        .unwrap();
    let diag = settle(&engine, "a4c138").await;

    assert!(diag.available);
    assert_eq!(diag.last_seen_at, T0 + 49 * HOUR);
    assert_eq!(diag.battery_percent, None);
    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::Availability("a4c138".into(), false),
            SinkEvent::Availability("a4c138".into(), true),
            SinkEvent::Reading("a4c138".into(), Reading::Heartbeat),
        ]
    );
}

#[tokio::test]
async fn test_zcl_attribute_report() {
    let (engine, sink, _tx, _clock) = setup(&[]);
    engine.init_device("door-1", "door", &ias_endpoints()).unwrap();

    // Report: attr 0x0021 uint8 = 150 half-percent
    let report = Bytes::from_static(&[0x18, 0x03, 0x0A, 0x21, 0x00, 0x20, 0x96]);
    engine
        .deliver_frame("door-1", 1, cluster::POWER_CONFIGURATION, report)
        .unwrap();
    let diag = settle(&engine, "door-1").await;

    assert_eq!(sink.readings("door-1"), vec![Reading::BatteryPercent(75)]);
    assert_eq!(diag.battery_percent, Some(75));
}

#[tokio::test]
async fn test_silence_marks_unavailable_and_contact_restores() {
    let (engine, sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    clock.advance(30 * HOUR);
    assert_eq!(engine.tick(), 1);
    let diag = settle(&engine, "a4c138").await;
    assert!(diag.available);

    clock.advance(19 * HOUR);
    engine.tick();
    let diag = settle(&engine, "a4c138").await;
    assert!(!diag.available);
    assert_eq!(
        sink.events(),
        vec![SinkEvent::Availability("a4c138".into(), false)]
    );

    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::value(4, 20)]))
        .unwrap();
    let diag = settle(&engine, "a4c138").await;
    assert!(diag.available);
    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::Availability("a4c138".into(), false),
            SinkEvent::Availability("a4c138".into(), true),
            SinkEvent::Reading("a4c138".into(), Reading::Heartbeat),
            SinkEvent::Reading("a4c138".into(), Reading::BatteryPercent(20)),
        ]
    );
}

#[tokio::test]
async fn test_last_seen_never_moves_backwards() {
    let (engine, _sink, _tx, clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();

    clock.set(T0 + 10 * HOUR);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::value(4, 90)]))
        .unwrap();
    clock.set(T0 + 2 * HOUR);
    engine
        .deliver_frame("a4c138", 1, cluster::TUYA, tuya_report(&[Datapoint::value(4, 89)]))
        .unwrap();
    let diag = settle(&engine, "a4c138").await;

    assert_eq!(diag.last_seen_at, T0 + 10 * HOUR);
    assert_eq!(diag.battery_percent, Some(89));
}

#[tokio::test]
async fn test_button_press_and_removal() {
    let (engine, sink, _tx, _clock) = setup(&[]);
    let endpoints = vec![EndpointDescriptor::new(
        1,
        [cluster::ON_OFF, cluster::TUYA],
    )];
    engine.init_device("btn-1", "tuya_sensor", &endpoints).unwrap();

    // Tuya 0xFD press, double
    let press = Bytes::from_static(&[0x19, 0x04, 0xFD, 0x01]);
    engine
        .deliver_frame("btn-1", 1, cluster::ON_OFF, press)
        .unwrap();
    settle(&engine, "btn-1").await;
    assert_eq!(sink.readings("btn-1"), vec![Reading::command("button", 1)]);

    engine.remove_device("btn-1").await.unwrap();
    assert!(matches!(
        engine.deliver_frame("btn-1", 1, cluster::ON_OFF, Bytes::new()),
        Err(IngestError::DeviceNotFound(_))
    ));
    assert!(matches!(
        engine.remove_device("btn-1").await,
        Err(IngestError::DeviceNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let (engine, _sink, _tx, _clock) = setup(&[]);
    engine
        .init_device("a4c138", "tuya_sensor", &tuya_endpoints())
        .unwrap();
    engine.init_device("door-1", "door", &ias_endpoints()).unwrap();
    engine.start_liveness();
    engine.start_liveness();

    tokio::time::sleep(Duration::from_secs(1)).await;
    engine.shutdown().await;
    assert!(engine.device_ids().is_empty());
}
