//! Codec error types

use errors::{ErrorCategory, SenseError, SenseErrorTrait};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Failure to turn bytes into typed records
///
/// A decode error always discards the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("DP {id} declares {declared} payload bytes but only {available} remain")]
    Truncated {
        id: u8,
        declared: usize,
        available: usize,
    },

    #[error("Unknown data type 0x{0:02X}")]
    InvalidType(u8),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    #[error("Frame too short: need {needed} bytes, got {actual}")]
    FrameTooShort { needed: usize, actual: usize },

    #[error("Unsupported command 0x{0:02X}")]
    UnsupportedCommand(u8),
}

impl DecodeError {
    pub(crate) fn payload(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind,
            reason: reason.into(),
        }
    }
}

impl SenseErrorTrait for DecodeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Truncated { .. } => "DECODE_TRUNCATED",
            Self::InvalidType(_) => "DECODE_INVALID_TYPE",
            Self::InvalidPayload { .. } => "DECODE_INVALID_PAYLOAD",
            Self::FrameTooShort { .. } => "DECODE_FRAME_TOO_SHORT",
            Self::UnsupportedCommand(_) => "DECODE_UNSUPPORTED_COMMAND",
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Decode
    }
}

impl From<DecodeError> for SenseError {
    fn from(err: DecodeError) -> Self {
        SenseError::Decode {
            protocol: "zigbee".to_string(),
            message: err.to_string(),
        }
    }
}
