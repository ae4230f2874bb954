//! Tracking frequency tiers and their static cadence table.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named tracking cadence/accuracy profile.
///
/// Ordered from the most battery-friendly tier to the most precise one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingFrequency {
    UltraEfficient,
    BatterySaver,
    Low,
    Medium,
    High,
}

impl Default for TrackingFrequency {
    fn default() -> Self {
        Self::Medium
    }
}

impl TrackingFrequency {
    /// All tiers, from ultra-efficient to high.
    pub const ALL: [TrackingFrequency; 5] = [
        Self::UltraEfficient,
        Self::BatterySaver,
        Self::Low,
        Self::Medium,
        Self::High,
    ];

    /// Static cadence configuration for this tier.
    pub fn config(self) -> &'static TrackingConfig {
        match self {
            Self::UltraEfficient => &ULTRA_EFFICIENT,
            Self::BatterySaver => &BATTERY_SAVER,
            Self::Low => &LOW,
            Self::Medium => &MEDIUM,
            Self::High => &HIGH,
        }
    }

    /// Expected battery drain per day in percent, used for UI estimates.
    pub fn estimated_daily_usage_percent(self) -> f64 {
        match self {
            Self::High => 3.2,
            Self::Medium => 1.5,
            Self::Low => 0.6,
            Self::BatterySaver => 0.2,
            Self::UltraEfficient => 0.08,
        }
    }

    /// Settings/config-file identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UltraEfficient => "ultra-efficient",
            Self::BatterySaver => "battery-saver",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for TrackingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown frequency name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tracking frequency '{0}' (expected one of: high, medium, low, battery-saver, ultra-efficient)")]
pub struct ParseFrequencyError(pub String);

impl FromStr for TrackingFrequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ultra-efficient" | "ultra_efficient" => Ok(Self::UltraEfficient),
            "battery-saver" | "battery_saver" => Ok(Self::BatterySaver),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ParseFrequencyError(other.to_string())),
        }
    }
}

/// Per-tier sampling parameters.
///
/// The deferred-update fields are forwarded to the location provider as
/// hints only; the engine itself never batches samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Minimum movement between platform updates, in meters.
    pub distance_interval_m: u32,
    /// Minimum time between platform updates.
    pub time_interval: Duration,
    pub deferred_updates_interval: Duration,
    pub deferred_updates_distance_m: u32,
    /// Ask the platform for significant-change delivery only.
    pub significant_change_only: bool,
}

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

const ULTRA_EFFICIENT: TrackingConfig = TrackingConfig {
    distance_interval_m: 100,
    time_interval: minutes(30),
    deferred_updates_interval: minutes(60),
    deferred_updates_distance_m: 500,
    significant_change_only: true,
};

const BATTERY_SAVER: TrackingConfig = TrackingConfig {
    distance_interval_m: 50,
    time_interval: minutes(15),
    deferred_updates_interval: minutes(30),
    deferred_updates_distance_m: 250,
    significant_change_only: false,
};

const LOW: TrackingConfig = TrackingConfig {
    distance_interval_m: 30,
    time_interval: minutes(5),
    deferred_updates_interval: minutes(15),
    deferred_updates_distance_m: 150,
    significant_change_only: false,
};

const MEDIUM: TrackingConfig = TrackingConfig {
    distance_interval_m: 20,
    time_interval: minutes(1),
    deferred_updates_interval: minutes(5),
    deferred_updates_distance_m: 100,
    significant_change_only: false,
};

const HIGH: TrackingConfig = TrackingConfig {
    distance_interval_m: 10,
    time_interval: Duration::from_secs(30),
    deferred_updates_interval: minutes(2),
    deferred_updates_distance_m: 50,
    significant_change_only: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_tighten_towards_high() {
        for pair in TrackingFrequency::ALL.windows(2) {
            let (looser, tighter) = (pair[0].config(), pair[1].config());
            assert!(
                tighter.distance_interval_m < looser.distance_interval_m,
                "{} vs {}",
                pair[0],
                pair[1]
            );
            assert!(tighter.time_interval < looser.time_interval);
        }
    }

    #[test]
    fn test_medium_table_entry() {
        let config = TrackingFrequency::Medium.config();
        assert_eq!(config.distance_interval_m, 20);
        assert_eq!(config.time_interval, Duration::from_secs(60));
        assert_eq!(config.deferred_updates_distance_m, 100);
        assert!(!config.significant_change_only);
    }

    #[test]
    fn test_only_ultra_efficient_is_significant_change_only() {
        for frequency in TrackingFrequency::ALL {
            assert_eq!(
                frequency.config().significant_change_only,
                frequency == TrackingFrequency::UltraEfficient
            );
        }
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        for frequency in TrackingFrequency::ALL {
            assert_eq!(frequency.to_string().parse::<TrackingFrequency>(), Ok(frequency));
        }
        assert_eq!("  HIGH ".parse::<TrackingFrequency>(), Ok(TrackingFrequency::High));
        assert_eq!("battery_saver".parse::<TrackingFrequency>(), Ok(TrackingFrequency::BatterySaver));
        assert!("hourly".parse::<TrackingFrequency>().is_err());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&TrackingFrequency::BatterySaver).unwrap();
        assert_eq!(json, "\"battery-saver\"");
    }

    #[test]
    fn test_estimated_usage_decreases_with_tier() {
        for pair in TrackingFrequency::ALL.windows(2) {
            assert!(
                pair[0].estimated_daily_usage_percent() < pair[1].estimated_daily_usage_percent()
            );
        }
    }
}
