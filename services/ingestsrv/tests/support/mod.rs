//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ingestsrv::{
    DeviceConfig, EndpointDescriptor, EngineConfig, FrameTransmitter, IngestEngine, ReadingSink,
    TransmissionFailure,
};
use parking_lot::Mutex;
use zigsense_codec::tuya::{encode_data_frame, TuyaCommand};
use zigsense_codec::{cluster, Datapoint};
use zigsense_routing::Reading;

pub const T0: i64 = 1_700_000_000_000;
pub const HOUR: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Reading(String, Reading),
    Availability(String, bool),
}

/// Sink that remembers everything it was given
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn readings(&self, device_id: &str) -> Vec<Reading> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Reading(id, r) if id == device_id => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn alarms(&self, device_id: &str) -> Vec<Reading> {
        self.readings(device_id)
            .into_iter()
            .filter(Reading::is_alarm)
            .collect()
    }
}

impl ReadingSink for RecordingSink {
    fn apply_reading(&self, device_id: &str, reading: &Reading) {
        self.events
            .lock()
            .push(SinkEvent::Reading(device_id.to_string(), reading.clone()));
    }

    fn availability_changed(&self, device_id: &str, available: bool) {
        self.events
            .lock()
            .push(SinkEvent::Availability(device_id.to_string(), available));
    }
}

#[derive(Debug, Clone)]
pub struct SentFrame {
    pub device_id: String,
    pub endpoint: u8,
    pub cluster: u16,
    pub payload: Bytes,
}

/// Transmitter that fails on demand and records every attempt
#[derive(Default)]
pub struct ScriptedTransmitter {
    /// Consumed front to back; empty means success
    failures: Mutex<VecDeque<bool>>,
    sent: Mutex<Vec<SentFrame>>,
}

impl ScriptedTransmitter {
    /// Outcomes for the next attempts, `false` meaning the send fails
    pub fn with_outcomes(outcomes: &[bool]) -> Self {
        Self {
            failures: Mutex::new(outcomes.iter().map(|ok| !ok).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().clone()
    }

    pub fn sent_on(&self, cluster_id: u16) -> Vec<SentFrame> {
        self.sent()
            .into_iter()
            .filter(|f| f.cluster == cluster_id)
            .collect()
    }
}

#[async_trait]
impl FrameTransmitter for ScriptedTransmitter {
    async fn transmit(
        &self,
        device_id: &str,
        endpoint: u8,
        cluster: u16,
        payload: Bytes,
    ) -> Result<(), TransmissionFailure> {
        self.sent.lock().push(SentFrame {
            device_id: device_id.to_string(),
            endpoint,
            cluster,
            payload,
        });
        let fail = self.failures.lock().pop_front().unwrap_or(false);
        if fail {
            Err(TransmissionFailure::new(device_id, "no MAC ack"))
        } else {
            Ok(())
        }
    }
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.debounce.window_ms = 2000;
    config.debounce.auto_clear_ms = 60_000;
    config
        .device_classes
        .insert("tuya_sensor".to_string(), DeviceConfig::default());
    config.device_classes.insert(
        "door".to_string(),
        DeviceConfig {
            zone_source: "alarm_contact".to_string(),
            ..Default::default()
        },
    );
    config
}

pub fn tuya_endpoints() -> Vec<EndpointDescriptor> {
    vec![EndpointDescriptor::new(1, [0x0000, cluster::TUYA])]
}

pub fn ias_endpoints() -> Vec<EndpointDescriptor> {
    vec![EndpointDescriptor::new(
        1,
        [0x0000, cluster::POWER_CONFIGURATION, cluster::IAS_ZONE],
    )]
}

/// Tuya data report carrying `datapoints`
pub fn tuya_report(datapoints: &[Datapoint]) -> Bytes {
    encode_data_frame(TuyaCommand::DataReport, 1, 1, datapoints)
}

/// IAS zone status change notification, server to client
pub fn zone_status(status: u16) -> Bytes {
    let [lo, hi] = status.to_le_bytes();
    Bytes::from(vec![0x19, 0x01, 0x00, lo, hi, 0x00, 0x0A, 0x00, 0x00])
}

/// Flush a device's mailbox; every earlier message has been handled when
/// this returns
pub async fn settle(engine: &IngestEngine, device_id: &str) -> ingestsrv::DeviceDiagnostics {
    engine
        .diagnostics(device_id)
        .await
        .unwrap_or_else(|e| panic!("diagnostics for {}: {}", device_id, e))
}

pub fn engine_with(
    sink: &Arc<RecordingSink>,
    transmitter: &Arc<ScriptedTransmitter>,
    clock: &common::ManualTimeProvider,
) -> IngestEngine {
    IngestEngine::with_clock(
        test_config(),
        Arc::clone(sink) as Arc<dyn ReadingSink>,
        Arc::clone(transmitter) as Arc<dyn FrameTransmitter>,
        Arc::new(clock.clone()),
    )
    .unwrap_or_else(|e| panic!("engine: {}", e))
}
