//! Battery drain-rate estimation
//!
//! Purely diagnostic: the estimate is reported alongside readings but never
//! alters a reported percentage.

use std::collections::VecDeque;

use serde::Serialize;

/// Samples retained for the estimate
pub const HISTORY_LEN: usize = 30;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrainEstimate {
    /// Percent lost per day over the retained window
    pub rate_per_day: f64,
    /// Days until empty at the current rate
    pub days_remaining: u32,
}

/// Rolling window of `(timestamp_ms, percent)` samples
#[derive(Debug, Clone, Default)]
pub struct DrainEstimator {
    history: VecDeque<(i64, u8)>,
}

impl DrainEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at_ms: i64, percent: u8) {
        self.history.push_back((at_ms, percent));
        while self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Estimate from the oldest and newest samples
    ///
    /// `None` until at least two samples span a positive time and show a
    /// net decrease. A recharge or battery swap therefore yields no estimate
    /// until it scrolls out of the window.
    pub fn estimate(&self) -> Option<DrainEstimate> {
        let (&(t0, p0), &(t1, p1)) = (self.history.front()?, self.history.back()?);
        let days = (t1 - t0) as f64 / MS_PER_DAY;
        let dropped = f64::from(p0) - f64::from(p1);
        if days <= 0.0 || dropped <= 0.0 {
            return None;
        }
        let rate_per_day = dropped / days;
        Some(DrainEstimate {
            rate_per_day,
            days_remaining: (f64::from(p1) / rate_per_day).round() as u32,
        })
    }
}
