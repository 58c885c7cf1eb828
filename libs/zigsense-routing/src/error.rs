use errors::{ErrorCategory, SenseError, SenseErrorTrait};
use thiserror::Error;
use zigsense_codec::DpType;

/// What a routing decision was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKey {
    Dp(u8),
    Attribute { cluster: u16, attribute: u16 },
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dp(id) => write!(f, "DP {}", id),
            Self::Attribute { cluster, attribute } => {
                write!(f, "attribute 0x{:04X}/0x{:04X}", cluster, attribute)
            },
        }
    }
}

/// Why a record produced no reading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("{key} is ambiguous: {reason}")]
    Ambiguous { key: RouteKey, reason: String },

    #[error("{key} value {value} outside [{min}, {max}]")]
    OutOfRange {
        key: RouteKey,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{key} expects {expected} payload, got {found}")]
    TypeMismatch {
        key: RouteKey,
        expected: &'static str,
        found: DpType,
    },

    #[error("{key} has no mapping")]
    Unmapped { key: RouteKey },
}

impl RouteError {
    pub fn key(&self) -> RouteKey {
        match self {
            Self::Ambiguous { key, .. }
            | Self::OutOfRange { key, .. }
            | Self::TypeMismatch { key, .. }
            | Self::Unmapped { key } => *key,
        }
    }
}

impl SenseErrorTrait for RouteError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Ambiguous { .. } => "ROUTE_AMBIGUOUS",
            Self::OutOfRange { .. } => "ROUTE_OUT_OF_RANGE",
            Self::TypeMismatch { .. } => "ROUTE_TYPE_MISMATCH",
            Self::Unmapped { .. } => "ROUTE_UNMAPPED",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::OutOfRange { .. } => ErrorCategory::Validation,
            Self::Ambiguous { .. } | Self::TypeMismatch { .. } => ErrorCategory::Routing,
            Self::Unmapped { .. } => ErrorCategory::NotFound,
        }
    }

    fn log_level(&self) -> tracing::Level {
        match self {
            Self::Unmapped { .. } => tracing::Level::DEBUG,
            _ => tracing::Level::WARN,
        }
    }
}

impl From<RouteError> for SenseError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::OutOfRange {
                value, min, max, ..
            } => SenseError::OutOfRange {
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            },
            other => SenseError::RoutingAmbiguity {
                key: other.key().to_string(),
                reason: other.to_string(),
            },
        }
    }
}
