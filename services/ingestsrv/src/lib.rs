//! Zigsense ingestion engine
//!
//! Turns raw frames from sleepy Tuya/Zigbee devices into normalized
//! readings. Each device is driven by its own task:
//!
//! ```text
//! deliver_frame ─▶ device mailbox ─▶ decode ─▶ route ─▶ debounce ─▶ ReadingSink
//!                        ▲                                   │
//!          liveness tick ┘                 enroll / time sync ▼
//!                                                   FrameTransmitter
//! ```

pub mod config;
pub mod debounce;
mod device;
pub mod engine;
pub mod enrollment;
pub mod error;
pub mod liveness;
pub mod negotiation;
pub mod replay;
pub mod scheduler;
pub mod sink;
pub mod transmit;

pub use config::{DeviceConfig, EngineConfig, ResolvedClass};
pub use device::DeviceDiagnostics;
pub use engine::IngestEngine;
pub use enrollment::{EnrollmentSnapshot, EnrollmentState};
pub use error::{IngestError, Result};
pub use negotiation::{EndpointDescriptor, NegotiatedPaths, TelemetryPath};
pub use sink::{LoggingSink, ReadingSink};
pub use transmit::{DryRunTransmitter, FrameTransmitter, TransmissionFailure};
