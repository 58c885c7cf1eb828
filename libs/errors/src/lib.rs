//! Unified error handling for Zigsense crates
//!
//! Library crates keep their own narrow error enums; this crate provides the
//! shared taxonomy they are folded into at service boundaries, plus the
//! capability trait used for classification and log levels.

use thiserror::Error;

// ============================================================================
// SenseError - Main error type
// ============================================================================

/// Main error type shared by all Zigsense crates
#[derive(Debug, Error)]
pub enum SenseError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // Wire & Routing Errors
    // ======================================
    #[error("Decode error: {protocol}: {message}")]
    Decode { protocol: String, message: String },

    #[error("Routing ambiguity on {key}: {reason}")]
    RoutingAmbiguity { key: String, reason: String },

    #[error("Out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },

    #[error("No supported telemetry path: {0}")]
    NoSupportedPath(String),

    // ======================================
    // Device I/O Errors
    // ======================================
    #[error("Transmission to {device} failed: {reason}")]
    Transmission { device: String, reason: String },

    // ======================================
    // Resource Errors
    // ======================================
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Runtime Errors
    // ======================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::SenseError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SenseError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! decode_error {
    ($protocol:expr, $msg:expr) => {
        $crate::SenseError::Decode {
            protocol: $protocol.to_string(),
            message: $msg.to_string(),
        }
    };
}

// ============================================================================
// SenseError implements SenseErrorTrait
// ============================================================================

impl SenseErrorTrait for SenseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::RoutingAmbiguity { .. } => "ROUTING_AMBIGUITY",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::NoSupportedPath(_) => "NO_SUPPORTED_PATH",
            Self::Transmission { .. } => "TRANSMISSION_FAILURE",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },

            Self::Decode { .. } => ErrorCategory::Decode,

            Self::RoutingAmbiguity { .. } | Self::NoSupportedPath(_) => ErrorCategory::Routing,

            Self::OutOfRange { .. } => ErrorCategory::Validation,

            Self::Transmission { .. } => ErrorCategory::Transmission,

            Self::DeviceNotFound(_) => ErrorCategory::NotFound,

            Self::AlreadyExists(_) => ErrorCategory::Conflict,

            Self::Io(_) | Self::Internal(_) => ErrorCategory::Internal,

            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// ============================================================================
// Error capability trait
// ============================================================================

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Setup layer
    Configuration,

    // Wire layer
    Decode,
    Routing,
    Validation,

    // Device I/O layer
    Transmission,

    // Engine layer
    NotFound,
    Conflict,

    // System level
    Internal,
    Unknown,
}

/// Error capability trait
///
/// Every crate-level error type implements this so the service boundary can
/// classify failures without knowing the concrete enum.
pub trait SenseErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and diagnostics)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether retrying can succeed without operator action
    ///
    /// Transmission failures are retried opportunistically on the next
    /// device contact rather than on a timer.
    fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transmission
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Configuration => Level::ERROR,
            ErrorCategory::Decode | ErrorCategory::Routing | ErrorCategory::Transmission => {
                Level::WARN
            },
            ErrorCategory::Validation | ErrorCategory::NotFound | ErrorCategory::Conflict => {
                Level::INFO
            },
            ErrorCategory::Unknown => Level::WARN,
        }
    }

    /// Whether the failure should be surfaced to an operator
    fn should_alert(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Internal | ErrorCategory::Configuration
        )
    }
}
