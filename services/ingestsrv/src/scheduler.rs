//! Liveness scheduler - periodic availability sweep
//!
//! Every tick broadcasts the current time to all device tasks; each task
//! checks its own silence against its class thresholds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::TimeProvider;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::device::{DeviceHandle, DeviceMsg};

/// Send a liveness tick to every device, returning how many accepted it
pub(crate) fn broadcast_tick(devices: &DashMap<String, DeviceHandle>, now: i64) -> usize {
    let mut delivered = 0;
    for entry in devices.iter() {
        if entry.value().send(DeviceMsg::Tick { now }) {
            delivered += 1;
        } else {
            warn!(device = %entry.key(), "Device task gone, tick dropped");
        }
    }
    delivered
}

#[derive(Clone)]
pub struct LivenessScheduler {
    devices: Arc<DashMap<String, DeviceHandle>>,
    clock: Arc<dyn TimeProvider>,
    period: Duration,
    /// Shutdown signal
    shutdown: Arc<Notify>,
    /// Running state
    running: Arc<AtomicBool>,
}

impl LivenessScheduler {
    pub(crate) fn new(
        devices: Arc<DashMap<String, DeviceHandle>>,
        clock: Arc<dyn TimeProvider>,
        period: Duration,
    ) -> Self {
        Self {
            devices,
            clock,
            period,
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the sweep loop until [`Self::stop`] is called
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Liveness scheduler already running");
            return;
        }
        info!("Starting liveness scheduler, period {:?}", self.period);

        let mut ticker = interval(self.period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let count = self.tick();
                    debug!("Liveness tick sent to {} devices", count);
                }
                _ = self.shutdown.notified() => {
                    info!("Liveness scheduler received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Release);
        info!("Liveness scheduler stopped");
    }

    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One sweep at the current clock reading
    pub fn tick(&self) -> usize {
        broadcast_tick(&self.devices, self.clock.now_millis())
    }
}
