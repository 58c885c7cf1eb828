//! Per-device actor
//!
//! Each initialised device is owned by one tokio task. Frames, liveness
//! ticks, auto-clear firings and queries arrive on its mailbox and are
//! handled strictly in order, so the profile is never shared.
//!
//! Frame pipeline: activity -> accept check -> decode -> route -> debounce
//! -> sink, then any outbound work (enroll response, time sync). Every frame
//! is contact, negotiated or not; only decoding is limited to the negotiated
//! paths. Outbound work always comes after the sink has the frame's readings.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zigsense_battery::{BatteryStatus, DrainEstimate, DrainEstimator};
use zigsense_codec::tuya::{self, TuyaMessage};
use zigsense_codec::zcl::{self, button, global, ias};
use zigsense_codec::{cluster, DecodeError, ZclHeader};
use zigsense_routing::{route, route_attributes, route_zone_status, DeviceProfile, Reading};

use crate::config::{DebounceConfig, ResolvedClass};
use crate::debounce::{AlarmDebouncer, AutoClearToken};
use crate::enrollment::{EnrollTrigger, EnrollmentMachine, EnrollmentSnapshot, EnrollmentState};
use crate::liveness::{AvailabilityChange, LivenessMonitor};
use crate::negotiation::{NegotiatedPaths, TelemetryPath};
use crate::sink::ReadingSink;
use crate::transmit::FrameTransmitter;

pub(crate) enum DeviceMsg {
    Frame {
        endpoint: u8,
        cluster: u16,
        payload: Bytes,
        received_at: i64,
    },
    Tick {
        now: i64,
    },
    AutoClear(AutoClearToken),
    Diagnostics(oneshot::Sender<DeviceDiagnostics>),
    Shutdown,
}

/// Point-in-time view of one device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDiagnostics {
    pub device_id: String,
    pub class: String,
    pub path: TelemetryPath,
    pub enrollment: Option<EnrollmentSnapshot>,
    pub available: bool,
    pub last_seen_at: i64,
    pub decode_failures: u64,
    pub routing_failures: u64,
    pub battery_percent: Option<u8>,
    pub battery_status: Option<BatteryStatus>,
    pub drain: Option<DrainEstimate>,
    /// Alarm sources with an armed auto-clear
    pub auto_clear_pending: Vec<String>,
}

pub(crate) struct DeviceHandle {
    tx: mpsc::UnboundedSender<DeviceMsg>,
    task: JoinHandle<()>,
}

impl DeviceHandle {
    /// Queue a message; false if the task has exited
    pub(crate) fn send(&self, msg: DeviceMsg) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Ask the task to stop and wait for it
    pub(crate) async fn stop(self, device_id: &str) {
        let _ = self.tx.send(DeviceMsg::Shutdown);
        if let Err(e) = self.task.await {
            warn!(device = %device_id, "Device task ended abnormally: {}", e);
        }
    }
}

/// What one decoded frame asks of the device task
#[derive(Debug, Default)]
struct FrameContent {
    readings: Vec<Reading>,
    enroll_request: bool,
    time_sync: bool,
}

pub(crate) struct DeviceActor {
    profile: DeviceProfile,
    class: String,
    paths: NegotiatedPaths,
    enrollment: Option<EnrollmentMachine>,
    liveness: LivenessMonitor,
    debouncer: AlarmDebouncer,
    drain: DrainEstimator,
    last_battery: Option<u8>,
    zcl_seq: u8,
    sink: Arc<dyn ReadingSink>,
    transmitter: Arc<dyn FrameTransmitter>,
    mailbox: mpsc::WeakUnboundedSender<DeviceMsg>,
}

impl DeviceActor {
    /// Start the task for one device
    pub(crate) fn spawn(
        profile: DeviceProfile,
        class: &ResolvedClass,
        paths: NegotiatedPaths,
        debounce: &DebounceConfig,
        sink: Arc<dyn ReadingSink>,
        transmitter: Arc<dyn FrameTransmitter>,
    ) -> DeviceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let enrollment = paths
            .ias_endpoint
            .map(|ep| EnrollmentMachine::new(ep, class.zone_id));

        let mut profile = profile;
        profile.enrollment_pending = enrollment.is_some();

        let actor = Self {
            profile,
            class: class.name.clone(),
            paths,
            enrollment,
            liveness: LivenessMonitor::new(class.thresholds),
            debouncer: AlarmDebouncer::new(debounce.window_ms, debounce.auto_clear_ms),
            drain: DrainEstimator::new(),
            last_battery: None,
            zcl_seq: 0,
            sink,
            transmitter,
            mailbox: tx.downgrade(),
        };
        let task = tokio::spawn(actor.run(rx));
        DeviceHandle { tx, task }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<DeviceMsg>) {
        debug!(device = %self.profile.device_id, "Device task started");
        self.enroll(EnrollTrigger::Proactive).await;

        while let Some(msg) = rx.recv().await {
            match msg {
                DeviceMsg::Frame {
                    endpoint,
                    cluster: cluster_id,
                    payload,
                    received_at,
                } => {
                    self.handle_frame(endpoint, cluster_id, &payload, received_at)
                        .await
                },
                DeviceMsg::Tick { now } => self.handle_tick(now),
                DeviceMsg::AutoClear(token) => self.handle_auto_clear(token),
                DeviceMsg::Diagnostics(reply) => {
                    let _ = reply.send(self.diagnostics());
                },
                DeviceMsg::Shutdown => break,
            }
        }

        self.debouncer.cancel_all();
        debug!(device = %self.profile.device_id, "Device task stopped");
    }

    async fn handle_frame(&mut self, endpoint: u8, cluster_id: u16, payload: &[u8], now: i64) {
        if let Some(heartbeat) = self.liveness.on_activity(&mut self.profile, now) {
            self.sink.availability_changed(&self.profile.device_id, true);
            self.sink.apply_reading(&self.profile.device_id, &heartbeat);
        }

        let content = if self.paths.accepts(endpoint, cluster_id) {
            match self.decode_frame(cluster_id, payload) {
                Ok(content) => content,
                Err(e) => {
                    self.profile.record_decode_failure();
                    warn!(
                        device = %self.profile.device_id,
                        "Frame discarded ({}): {}",
                        e,
                        common::hex::encode_upper(payload)
                    );
                    FrameContent::default()
                },
            }
        } else {
            debug!(
                device = %self.profile.device_id,
                "Not decoding frame on unnegotiated ep={} cluster=0x{:04X}",
                endpoint,
                cluster_id
            );
            FrameContent::default()
        };

        self.emit(content.readings, now);

        // The device is awake right now, so this is the moment to answer
        if content.enroll_request {
            self.enroll(EnrollTrigger::DeviceRequest).await;
        } else if self.enrollment.as_ref().is_some_and(|m| m.retry_pending()) {
            self.enroll(EnrollTrigger::Retry).await;
        }

        if content.time_sync {
            self.send_time_sync(endpoint, now).await;
        }
    }

    fn decode_frame(&mut self, cluster_id: u16, payload: &[u8]) -> Result<FrameContent, DecodeError> {
        let (header, body) = ZclHeader::parse(payload)?;
        let mut content = FrameContent::default();

        if header.is_global() {
            let records = match header.command {
                global::REPORT_ATTRIBUTES => zcl::parse_attribute_report(body)?,
                global::READ_ATTRIBUTES_RESPONSE => zcl::parse_read_attributes_response(body)?,
                other => {
                    debug!(device = %self.profile.device_id, "Ignored global command 0x{:02X}", other);
                    return Ok(content);
                },
            };
            content.readings = route_attributes(cluster_id, &records, &mut self.profile);
            return Ok(content);
        }

        match cluster_id {
            cluster::TUYA => match tuya::decode_message(header.command, body)? {
                TuyaMessage::Datapoints { datapoints, .. } => {
                    let profile = &mut self.profile;
                    content.readings = datapoints
                        .iter()
                        .filter_map(|dp| route(dp, profile))
                        .collect();
                },
                TuyaMessage::TimeSyncRequest => content.time_sync = true,
                TuyaMessage::McuVersion { version, .. } => {
                    info!(device = %self.profile.device_id, "MCU version 0x{:02X}", version);
                },
                TuyaMessage::Other(command) => {
                    debug!(device = %self.profile.device_id, "Ignored Tuya command {:?}", command);
                },
            },
            cluster::IAS_ZONE => match ias::decode_command(header.command, body)? {
                ias::ZoneCommand::StatusChange(notification) => {
                    content
                        .readings
                        .push(route_zone_status(notification.status, &self.profile));
                },
                ias::ZoneCommand::EnrollRequest(request) => {
                    info!(
                        device = %self.profile.device_id,
                        "Zone enroll request, zone type 0x{:04X}",
                        request.zone_type
                    );
                    content.enroll_request = true;
                },
            },
            cluster::ON_OFF if header.command == button::TUYA_PRESS => {
                let press = button::decode_press(body)?;
                content
                    .readings
                    .push(Reading::command("button", i64::from(press.code())));
            },
            cluster::SCENES if header.command == button::SCENE_RECALL => {
                let recall = button::decode_scene_recall(body)?;
                content
                    .readings
                    .push(Reading::command("scene_recall", i64::from(recall.scene)));
            },
            other => {
                debug!(
                    device = %self.profile.device_id,
                    "Ignored command 0x{:02X} on cluster 0x{:04X}",
                    header.command,
                    other
                );
            },
        }
        Ok(content)
    }

    fn emit(&mut self, readings: Vec<Reading>, now: i64) {
        for reading in readings {
            match &reading {
                Reading::AlarmEdge { source, active } => {
                    if !self.debouncer.should_emit(&mut self.profile, now) {
                        continue;
                    }
                    if *active {
                        let mailbox = self.mailbox.clone();
                        self.debouncer.schedule_auto_clear(source, move |token| {
                            if let Some(tx) = mailbox.upgrade() {
                                let _ = tx.send(DeviceMsg::AutoClear(token));
                            }
                        });
                    } else {
                        self.debouncer.cancel(source);
                    }
                },
                Reading::BatteryPercent(percent) => {
                    self.drain.record(now, *percent);
                    self.last_battery = Some(*percent);
                },
                _ => {},
            }
            self.sink.apply_reading(&self.profile.device_id, &reading);
        }
    }

    fn handle_auto_clear(&mut self, token: AutoClearToken) {
        if let Some(source) = self.debouncer.take_fired(token) {
            debug!(device = %self.profile.device_id, "Auto-clearing {}", source);
            self.sink
                .apply_reading(&self.profile.device_id, &Reading::alarm(source, false));
        }
    }

    fn handle_tick(&mut self, now: i64) {
        if self.liveness.check_liveness(&self.profile, now) == AvailabilityChange::BecameUnavailable {
            self.sink.availability_changed(&self.profile.device_id, false);
        }
    }

    async fn enroll(&mut self, trigger: EnrollTrigger) {
        let Some(machine) = self.enrollment.as_mut() else {
            return;
        };
        if !machine.begin(trigger) {
            return;
        }
        let endpoint = machine.endpoint();
        let zone_id = machine.zone_id();

        let frame = ias::encode_enroll_response(self.next_seq(), zone_id);
        let result = self
            .transmitter
            .transmit(&self.profile.device_id, endpoint, cluster::IAS_ZONE, frame)
            .await;

        if let Some(machine) = self.enrollment.as_mut() {
            machine.complete(&result);
            self.profile.enrollment_pending = machine.state() != EnrollmentState::Enrolled;
        }
    }

    async fn send_time_sync(&mut self, endpoint: u8, now: i64) {
        let utc = now.div_euclid(1000);
        let offset = i64::from(chrono::Local::now().offset().local_minus_utc());
        let utc_secs = u32::try_from(utc).unwrap_or(0);
        let local_secs = u32::try_from(utc + offset).unwrap_or(utc_secs);

        let frame = tuya::time_sync_frame(self.next_seq(), utc_secs, local_secs);
        if let Err(e) = self
            .transmitter
            .transmit(&self.profile.device_id, endpoint, cluster::TUYA, frame)
            .await
        {
            warn!(device = %self.profile.device_id, "Time sync not sent: {}", e);
        }
    }

    fn next_seq(&mut self) -> u8 {
        self.zcl_seq = self.zcl_seq.wrapping_add(1);
        self.zcl_seq
    }

    fn diagnostics(&self) -> DeviceDiagnostics {
        DeviceDiagnostics {
            device_id: self.profile.device_id.clone(),
            class: self.class.clone(),
            path: self.paths.path,
            enrollment: self.enrollment.as_ref().map(EnrollmentMachine::snapshot),
            available: self.liveness.is_available(),
            last_seen_at: self.profile.last_seen_at(),
            decode_failures: self.profile.decode_failures(),
            routing_failures: self.profile.routing_failures(),
            battery_percent: self.last_battery,
            battery_status: self.last_battery.map(BatteryStatus::from_percent),
            drain: self.drain.estimate(),
            auto_clear_pending: self.debouncer.pending_sources(),
        }
    }
}
