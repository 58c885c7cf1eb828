//! Reading sink (consumed interface)

use tracing::info;
use zigsense_routing::Reading;

/// Consumer of normalized readings
///
/// Calls are fire-and-forget: an implementation must handle its own storage
/// failures and must not block, since it runs on the device task.
pub trait ReadingSink: Send + Sync {
    fn apply_reading(&self, device_id: &str, reading: &Reading);

    /// Availability transitions; ignored unless the host tracks them
    fn availability_changed(&self, _device_id: &str, _available: bool) {}
}

/// Sink that only logs, used by the replay binary
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ReadingSink for LoggingSink {
    fn apply_reading(&self, device_id: &str, reading: &Reading) {
        info!(device = %device_id, "{}", reading);
    }

    fn availability_changed(&self, device_id: &str, available: bool) {
        info!(
            device = %device_id,
            "Availability: {}",
            if available { "online" } else { "offline" }
        );
    }
}
