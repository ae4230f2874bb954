//! Battery level source and drain estimation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::state::BatteryLevel;

/// Sentinel stored in [`FixedBattery`] when no level is known.
const UNKNOWN_LEVEL: u8 = u8::MAX;

/// History window kept by [`BatteryUsageTracker`].
const HISTORY_WINDOW_DAYS: i64 = 7;

/// Minimum span of history before a daily rate is reported (~2.4 hours).
const MIN_SPAN_DAYS: f64 = 0.1;

/// Source of the device battery level.
///
/// Real platform integrations live outside this crate.
pub trait BatterySource: Send + Sync {
    /// Current charge, or `None` when unavailable.
    fn battery_level(&self) -> Option<BatteryLevel>;
}

/// Battery source with a level set by the caller.
///
/// Cloning shares the underlying level, so tests and the CLI can adjust it
/// while the service is running.
#[derive(Debug, Clone)]
pub struct FixedBattery {
    level: Arc<AtomicU8>,
}

impl FixedBattery {
    pub fn new(level: Option<BatteryLevel>) -> Self {
        let raw = level.map_or(UNKNOWN_LEVEL, BatteryLevel::percent);
        Self {
            level: Arc::new(AtomicU8::new(raw)),
        }
    }

    pub fn set(&self, level: Option<BatteryLevel>) {
        let raw = level.map_or(UNKNOWN_LEVEL, BatteryLevel::percent);
        self.level.store(raw, Ordering::SeqCst);
    }
}

impl BatterySource for FixedBattery {
    fn battery_level(&self) -> Option<BatteryLevel> {
        match self.level.load(Ordering::SeqCst) {
            UNKNOWN_LEVEL => None,
            raw => Some(BatteryLevel::new(raw)),
        }
    }
}

/// Rolling record of battery readings used to estimate daily drain.
#[derive(Debug, Default)]
pub struct BatteryUsageTracker {
    history: VecDeque<(DateTime<Utc>, BatteryLevel)>,
}

impl BatteryUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading and drop readings older than a week.
    pub fn record(&mut self, at: DateTime<Utc>, level: BatteryLevel) {
        let cutoff = at - Duration::days(HISTORY_WINDOW_DAYS);
        self.history.retain(|(t, _)| *t > cutoff);

        let position = self.history.partition_point(|(t, _)| *t <= at);
        self.history.insert(position, (at, level));
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Observed drain in percent per day.
    ///
    /// Needs at least two readings spanning 0.1 day; the change is taken as
    /// an absolute value so charging shows up as usage too.
    pub fn daily_usage_percent(&self) -> Option<f64> {
        if self.history.len() < 2 {
            return None;
        }

        let (first_at, first) = self.history.front()?;
        let (last_at, last) = self.history.back()?;

        let span_days = (*last_at - *first_at).num_milliseconds() as f64 / 86_400_000.0;
        if span_days < MIN_SPAN_DAYS {
            return None;
        }

        let change = (f64::from(last.percent()) - f64::from(first.percent())).abs();
        Some(change / span_days)
    }
}
