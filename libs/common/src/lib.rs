//! Shared bootstrap utilities for Zigsense services

pub mod hex;
pub mod logging;
pub mod shutdown;
pub mod time;

pub use logging::{LogConfig, LogFormat};
pub use time::{FixedTimeProvider, ManualTimeProvider, SystemTimeProvider, TimeProvider};
