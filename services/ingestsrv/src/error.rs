//! Ingestion service errors

use errors::{ErrorCategory, SenseError, SenseErrorTrait};
use thiserror::Error;
use zigsense_battery::CurveError;
use zigsense_codec::DecodeError;
use zigsense_routing::PolicyError;

use crate::transmit::TransmissionFailure;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Unknown device class: {0}")]
    UnknownDeviceClass(String),

    #[error("Device already initialised: {0}")]
    AlreadyInitialised(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No supported telemetry path for device {0}")]
    NoSupportedPath(String),

    #[error("Invalid capture line {line}: {reason}")]
    Capture { line: usize, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Transmission(#[from] TransmissionFailure),

    #[error("Device task for {0} has stopped")]
    DeviceStopped(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for IngestError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl SenseErrorTrait for IngestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::UnknownDeviceClass(_) => "UNKNOWN_DEVICE_CLASS",
            Self::AlreadyInitialised(_) => "ALREADY_INITIALISED",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::NoSupportedPath(_) => "NO_SUPPORTED_PATH",
            Self::Capture { .. } => "CAPTURE_PARSE_ERROR",
            Self::Decode(e) => e.error_code(),
            Self::Curve(e) => e.error_code(),
            Self::Policy(_) => "INVALID_ROUTING_POLICY",
            Self::Transmission(e) => e.error_code(),
            Self::DeviceStopped(_) => "DEVICE_STOPPED",
            Self::Io(_) => "IO_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::InvalidConfig { .. }
            | Self::UnknownDeviceClass(_)
            | Self::Curve(_)
            | Self::Policy(_) => ErrorCategory::Configuration,
            Self::AlreadyInitialised(_) => ErrorCategory::Conflict,
            Self::DeviceNotFound(_) => ErrorCategory::NotFound,
            Self::NoSupportedPath(_) => ErrorCategory::Routing,
            Self::Capture { .. } | Self::Decode(_) => ErrorCategory::Decode,
            Self::Transmission(_) => ErrorCategory::Transmission,
            Self::DeviceStopped(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }
}

impl From<IngestError> for SenseError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config(msg) => SenseError::Configuration(msg),
            IngestError::InvalidConfig { field, reason } => {
                SenseError::InvalidConfig { field, reason }
            },
            IngestError::UnknownDeviceClass(class) => {
                SenseError::MissingConfig(format!("device class {}", class))
            },
            IngestError::AlreadyInitialised(id) => SenseError::AlreadyExists(id),
            IngestError::DeviceNotFound(id) => SenseError::DeviceNotFound(id),
            IngestError::NoSupportedPath(id) => SenseError::NoSupportedPath(id),
            IngestError::Decode(e) => e.into(),
            IngestError::Curve(e) => e.into(),
            IngestError::Transmission(e) => SenseError::Transmission {
                device: e.device,
                reason: e.reason,
            },
            IngestError::Io(e) => SenseError::Io(e),
            other => SenseError::Internal(other.to_string()),
        }
    }
}
