//! Ingestion engine facade
//!
//! Owns the device registry and the liveness scheduler. Every device runs
//! as its own task (see [`crate::device`]); the engine only routes messages
//! to the right mailbox, so no call here ever waits on a device.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{SystemTimeProvider, TimeProvider};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{EngineConfig, ResolvedClass};
use crate::device::{DeviceActor, DeviceDiagnostics, DeviceHandle, DeviceMsg};
use crate::error::{IngestError, Result};
use crate::negotiation::{negotiate, EndpointDescriptor, NegotiatedPaths};
use crate::scheduler::{broadcast_tick, LivenessScheduler};
use crate::sink::ReadingSink;
use crate::transmit::FrameTransmitter;

pub struct IngestEngine {
    config: Arc<EngineConfig>,
    devices: Arc<DashMap<String, DeviceHandle>>,
    sink: Arc<dyn ReadingSink>,
    transmitter: Arc<dyn FrameTransmitter>,
    clock: Arc<dyn TimeProvider>,
    liveness: Mutex<Option<(LivenessScheduler, JoinHandle<()>)>>,
}

impl IngestEngine {
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn ReadingSink>,
        transmitter: Arc<dyn FrameTransmitter>,
    ) -> Result<Self> {
        Self::with_clock(config, sink, transmitter, Arc::new(SystemTimeProvider))
    }

    /// Build an engine reading time from `clock`
    pub fn with_clock(
        config: EngineConfig,
        sink: Arc<dyn ReadingSink>,
        transmitter: Arc<dyn FrameTransmitter>,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            devices: Arc::new(DashMap::new()),
            sink,
            transmitter,
            clock,
            liveness: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Initialise a device of a configured class
    ///
    /// Negotiates the telemetry path from the transport's catalog and starts
    /// the device task. Must be called from within a tokio runtime.
    pub fn init_device(
        &self,
        device_id: &str,
        class: &str,
        endpoints: &[EndpointDescriptor],
    ) -> Result<NegotiatedPaths> {
        let resolved = self.config.device_class(class)?;
        self.init_device_with(device_id, &resolved, endpoints)
    }

    /// Initialise a device with an already resolved class
    pub fn init_device_with(
        &self,
        device_id: &str,
        class: &ResolvedClass,
        endpoints: &[EndpointDescriptor],
    ) -> Result<NegotiatedPaths> {
        let paths = negotiate(device_id, endpoints)?;

        match self.devices.entry(device_id.to_string()) {
            Entry::Occupied(_) => Err(IngestError::AlreadyInitialised(device_id.to_string())),
            Entry::Vacant(slot) => {
                let profile = class.build_profile(device_id, self.clock.now_millis());
                let handle = DeviceActor::spawn(
                    profile,
                    class,
                    paths.clone(),
                    &self.config.debounce,
                    Arc::clone(&self.sink),
                    Arc::clone(&self.transmitter),
                );
                slot.insert(handle);
                info!(device = %device_id, "Initialised as {}", class.name);
                Ok(paths)
            },
        }
    }

    /// Hand an inbound frame to its device; never waits
    pub fn deliver_frame(
        &self,
        device_id: &str,
        endpoint: u8,
        cluster: u16,
        payload: impl Into<Bytes>,
    ) -> Result<()> {
        let handle = self
            .devices
            .get(device_id)
            .ok_or_else(|| IngestError::DeviceNotFound(device_id.to_string()))?;
        let sent = handle.send(DeviceMsg::Frame {
            endpoint,
            cluster,
            payload: payload.into(),
            received_at: self.clock.now_millis(),
        });
        if sent {
            Ok(())
        } else {
            Err(IngestError::DeviceStopped(device_id.to_string()))
        }
    }

    /// Stop a device's task and forget it
    pub async fn remove_device(&self, device_id: &str) -> Result<()> {
        let (_, handle) = self
            .devices
            .remove(device_id)
            .ok_or_else(|| IngestError::DeviceNotFound(device_id.to_string()))?;
        handle.stop(device_id).await;
        info!(device = %device_id, "Removed");
        Ok(())
    }

    pub async fn diagnostics(&self, device_id: &str) -> Result<DeviceDiagnostics> {
        let (tx, rx) = oneshot::channel();
        {
            let handle = self
                .devices
                .get(device_id)
                .ok_or_else(|| IngestError::DeviceNotFound(device_id.to_string()))?;
            if !handle.send(DeviceMsg::Diagnostics(tx)) {
                return Err(IngestError::DeviceStopped(device_id.to_string()));
            }
        }
        rx.await
            .map_err(|_| IngestError::DeviceStopped(device_id.to_string()))
    }

    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Run one liveness sweep now
    pub fn tick(&self) -> usize {
        broadcast_tick(&self.devices, self.clock.now_millis())
    }

    /// Start the periodic liveness sweep; no-op if already started
    pub fn start_liveness(&self) {
        let mut slot = self.liveness.lock();
        if slot.is_some() {
            debug!("Liveness scheduler already started");
            return;
        }
        let scheduler = LivenessScheduler::new(
            Arc::clone(&self.devices),
            Arc::clone(&self.clock),
            Duration::from_secs(self.config.liveness.tick_secs),
        );
        let runner = scheduler.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        *slot = Some((scheduler, handle));
    }

    pub async fn stop_liveness(&self) {
        let running = self.liveness.lock().take();
        if let Some((scheduler, handle)) = running {
            scheduler.stop();
            let _ = handle.await;
        }
    }

    /// Stop the scheduler and every device task
    pub async fn shutdown(&self) {
        self.stop_liveness().await;

        let ids: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, handle)) = self.devices.remove(&id) {
                handle.stop(&id).await;
            }
        }
        info!("Ingestion engine stopped");
    }
}
