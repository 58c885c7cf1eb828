//! Alarm edge debouncing and auto-clear
//!
//! One physical event can arrive as several frames over different transport
//! paths. Edges inside the window after the last accepted edge are dropped.
//!
//! Each alarm source has its own auto-clear timer. Timers are
//! generation-stamped: the sleeping task only posts a token back to the
//! device task, and the token is honoured only if it is still the current
//! generation for its source. Cancelling or rescheduling retires the
//! generation, so a timer that already fired but has not been processed yet
//! can never clear a newer alarm.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use zigsense_routing::DeviceProfile;

/// Proof that a specific auto-clear timer elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoClearToken {
    generation: u64,
}

#[derive(Debug)]
struct PendingClear {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct AlarmDebouncer {
    window_ms: i64,
    auto_clear_after: Duration,
    generation: u64,
    pending: HashMap<String, PendingClear>,
}

impl AlarmDebouncer {
    pub fn new(window_ms: u64, auto_clear_ms: u64) -> Self {
        Self {
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            auto_clear_after: Duration::from_millis(auto_clear_ms),
            generation: 0,
            pending: HashMap::new(),
        }
    }

    /// Accept or suppress an edge arriving at `now`
    ///
    /// Accepted edges become the new reference point for the window.
    pub fn should_emit(&self, profile: &mut DeviceProfile, now: i64) -> bool {
        if let Some(last) = profile.last_alarm_at {
            let since = now - last;
            if (0..self.window_ms).contains(&since) {
                debug!(device = %profile.device_id, "Alarm edge suppressed, {}ms after previous", since);
                return false;
            }
        }
        profile.last_alarm_at = Some(now);
        true
    }

    /// Arm the auto-clear for `source`, replacing any timer it already has
    ///
    /// Other sources keep their timers. `on_elapsed` runs on a timer task
    /// after the delay; it should hand the token back to the owner, which
    /// then calls [`Self::take_fired`].
    pub fn schedule_auto_clear<F>(&mut self, source: &str, on_elapsed: F)
    where
        F: FnOnce(AutoClearToken) + Send + 'static,
    {
        self.cancel(source);
        self.generation += 1;
        let token = AutoClearToken {
            generation: self.generation,
        };
        let delay = self.auto_clear_after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_elapsed(token);
        });
        self.pending.insert(
            source.to_string(),
            PendingClear {
                generation: self.generation,
                handle,
            },
        );
    }

    /// Cancel the pending auto-clear for `source`, if any. Always safe to call.
    pub fn cancel(&mut self, source: &str) {
        if let Some(pending) = self.pending.remove(source) {
            pending.handle.abort();
            debug!("Auto-clear for {} cancelled", source);
        }
    }

    /// Cancel every pending auto-clear
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    /// Claim a fired timer; returns the source to clear if still current
    pub fn take_fired(&mut self, token: AutoClearToken) -> Option<String> {
        let source = self
            .pending
            .iter()
            .find(|(_, p)| p.generation == token.generation)
            .map(|(source, _)| source.clone());
        match source {
            Some(source) => {
                self.pending.remove(&source);
                Some(source)
            },
            None => {
                debug!("Stale auto-clear generation {} ignored", token.generation);
                None
            },
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Sources with an armed auto-clear, sorted
    pub fn pending_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.pending.keys().cloned().collect();
        sources.sort();
        sources
    }
}

impl Drop for AlarmDebouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
