//! IAS zone enrollment state machine
//!
//! ```text
//! Unenrolled ──request/init──▶ EnrollRequested ──tx ok──▶ Enrolled
//!                                   │  ▲
//!                              tx err  │ next contact
//!                                   ▼  │
//!                                  Failed
//! ```
//!
//! There is no timer-driven retry. A failed acknowledgement is re-sent the
//! next time the device is heard from, since that is the only moment a
//! sleepy device is known to be listening.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::transmit::TransmissionFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Unenrolled,
    EnrollRequested,
    Enrolled,
    /// Retried on the next inbound frame
    Failed,
}

/// Why an acknowledgement is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollTrigger {
    /// Host-initiated at device initialisation
    Proactive,
    /// The device sent a Zone Enroll Request
    DeviceRequest,
    /// Piggybacked on unrelated traffic after a failure
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrollmentSnapshot {
    pub state: EnrollmentState,
    pub attempts: u32,
    pub failures: u32,
    pub zone_id: u8,
}

#[derive(Debug, Clone)]
pub struct EnrollmentMachine {
    state: EnrollmentState,
    endpoint: u8,
    zone_id: u8,
    attempts: u32,
    failures: u32,
}

impl EnrollmentMachine {
    pub fn new(endpoint: u8, zone_id: u8) -> Self {
        Self {
            state: EnrollmentState::Unenrolled,
            endpoint,
            zone_id,
            attempts: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }

    pub fn zone_id(&self) -> u8 {
        self.zone_id
    }

    /// Whether the next inbound frame should carry a retry
    pub fn retry_pending(&self) -> bool {
        self.state == EnrollmentState::Failed
    }

    /// Decide whether `trigger` warrants sending an acknowledgement now
    ///
    /// Moves to `EnrollRequested` when it does. Device requests are always
    /// answered, even when already enrolled, since the device may have
    /// reset and resending is harmless.
    pub fn begin(&mut self, trigger: EnrollTrigger) -> bool {
        let send = match trigger {
            EnrollTrigger::Proactive => self.state == EnrollmentState::Unenrolled,
            EnrollTrigger::DeviceRequest => true,
            EnrollTrigger::Retry => self.state == EnrollmentState::Failed,
        };
        if send {
            debug!("Enrollment {:?} -> EnrollRequested ({:?})", self.state, trigger);
            self.state = EnrollmentState::EnrollRequested;
            self.attempts += 1;
        }
        send
    }

    /// Record the local transmission outcome of the acknowledgement
    pub fn complete(&mut self, result: &Result<(), TransmissionFailure>) {
        match result {
            Ok(()) => {
                info!("Zone enrolled, zone_id={}", self.zone_id);
                self.state = EnrollmentState::Enrolled;
            },
            Err(e) => {
                warn!("Enroll response not sent, retry on next contact: {}", e);
                self.state = EnrollmentState::Failed;
                self.failures += 1;
            },
        }
    }

    pub fn snapshot(&self) -> EnrollmentSnapshot {
        EnrollmentSnapshot {
            state: self.state,
            attempts: self.attempts,
            failures: self.failures,
            zone_id: self.zone_id,
        }
    }
}
