//! Accuracy/power policy.
//!
//! Maps tracking tier, battery level and foreground/background state to the
//! accuracy and cadence requested from the location provider.
//!
//! # Accuracy selection
//!
//! 1. Battery overrides tier: below 15% → `Lowest`, below 30% → `Low`
//! 2. Otherwise the tier decides: high → `High` (`Balanced` below 50%),
//!    medium → `Balanced`, low → `Low`, everything else → `Lowest`
//! 3. In the background with reduced accuracy enabled the result drops one tier
//!
//! One-shot reads use `Balanced`, or `Lowest` when the battery is low.

use std::fmt;
use std::time::Duration;

use super::frequency::TrackingFrequency;
use super::state::BatteryLevel;

/// Battery level below which the high tier falls back to balanced accuracy.
const HIGH_TIER_MIN_BATTERY: u8 = 50;

/// Requested positioning accuracy, ordered from cheapest to most precise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccuracyTier {
    /// ~3km; cell/wifi only.
    Lowest,
    /// ~1km.
    Low,
    /// ~100m; the default for most tiers.
    Balanced,
    /// Best available; GPS.
    High,
}

impl AccuracyTier {
    /// One tier cheaper, saturating at `Lowest`.
    pub fn degraded(self) -> Self {
        match self {
            Self::High => Self::Balanced,
            Self::Balanced => Self::Low,
            Self::Low | Self::Lowest => Self::Lowest,
        }
    }
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowest => write!(f, "lowest"),
            Self::Low => write!(f, "low"),
            Self::Balanced => write!(f, "balanced"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Distance and time interval requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub distance_interval_m: u32,
    pub time_interval: Duration,
}

/// Everything the provider needs to open or reconfigure a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub accuracy: AccuracyTier,
    pub cadence: Cadence,
    /// Batching hint; the engine does not enforce it.
    pub deferred_updates_interval: Duration,
    /// Batching hint; the engine does not enforce it.
    pub deferred_updates_distance_m: u32,
    pub significant_change_only: bool,
}

/// Resolve the accuracy to request for a continuous subscription.
pub fn resolve_accuracy(
    battery: Option<BatteryLevel>,
    frequency: TrackingFrequency,
    is_background: bool,
    reduced_accuracy_when_background: bool,
) -> AccuracyTier {
    let tier = accuracy_for(battery, frequency);

    if is_background && reduced_accuracy_when_background {
        tier.degraded()
    } else {
        tier
    }
}

fn accuracy_for(battery: Option<BatteryLevel>, frequency: TrackingFrequency) -> AccuracyTier {
    if let Some(level) = battery {
        if level.percent() < BatteryLevel::CRITICAL {
            return AccuracyTier::Lowest;
        }
        if level.percent() < BatteryLevel::LOW {
            return AccuracyTier::Low;
        }
    }

    match frequency {
        TrackingFrequency::High => {
            if battery.is_some_and(|b| b.percent() < HIGH_TIER_MIN_BATTERY) {
                AccuracyTier::Balanced
            } else {
                AccuracyTier::High
            }
        }
        TrackingFrequency::Medium => AccuracyTier::Balanced,
        TrackingFrequency::Low => AccuracyTier::Low,
        TrackingFrequency::BatterySaver | TrackingFrequency::UltraEfficient => AccuracyTier::Lowest,
    }
}

/// Straight lookup of the tier's distance and time interval.
pub fn resolve_cadence(frequency: TrackingFrequency) -> Cadence {
    let config = frequency.config();
    Cadence {
        distance_interval_m: config.distance_interval_m,
        time_interval: config.time_interval,
    }
}

/// Accuracy for explicit one-shot reads (check-ins, foreground refresh).
pub fn one_shot_accuracy(battery: Option<BatteryLevel>) -> AccuracyTier {
    if battery.is_some_and(BatteryLevel::is_low) {
        AccuracyTier::Lowest
    } else {
        AccuracyTier::Balanced
    }
}

/// Build the full subscription parameters.
pub fn watch_options(
    battery: Option<BatteryLevel>,
    frequency: TrackingFrequency,
    is_background: bool,
    reduced_accuracy_when_background: bool,
) -> WatchOptions {
    let config = frequency.config();
    WatchOptions {
        accuracy: resolve_accuracy(
            battery,
            frequency,
            is_background,
            reduced_accuracy_when_background,
        ),
        cadence: resolve_cadence(frequency),
        deferred_updates_interval: config.deferred_updates_interval,
        deferred_updates_distance_m: config.deferred_updates_distance_m,
        significant_change_only: config.significant_change_only,
    }
}
