//! Outbound frame transmission (consumed interface)
//!
//! Success only means the local radio accepted the frame. Sleepy devices
//! never confirm, so nothing downstream waits for the device.

use async_trait::async_trait;
use bytes::Bytes;
use errors::{ErrorCategory, SenseErrorTrait};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transmission to {device} failed: {reason}")]
pub struct TransmissionFailure {
    pub device: String,
    pub reason: String,
}

impl TransmissionFailure {
    pub fn new(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

impl SenseErrorTrait for TransmissionFailure {
    fn error_code(&self) -> &'static str {
        "TRANSMISSION_FAILURE"
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Transmission
    }
}

#[async_trait]
pub trait FrameTransmitter: Send + Sync {
    /// Hand a complete ZCL frame to the transport
    async fn transmit(
        &self,
        device_id: &str,
        endpoint: u8,
        cluster: u16,
        payload: Bytes,
    ) -> Result<(), TransmissionFailure>;
}

/// Logs frames instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunTransmitter;

#[async_trait]
impl FrameTransmitter for DryRunTransmitter {
    async fn transmit(
        &self,
        device_id: &str,
        endpoint: u8,
        cluster: u16,
        payload: Bytes,
    ) -> Result<(), TransmissionFailure> {
        info!(
            device = %device_id,
            "TX ep={} cluster=0x{:04X} {}",
            endpoint,
            cluster,
            common::hex::encode_upper(&payload)
        );
        Ok(())
    }
}
