//! Core value types for the tracking engine.
//!
//! - [`PositionSample`] - raw fix delivered by the location provider
//! - [`LocationUpdate`] - accepted position emitted to the directory
//! - [`BatteryLevel`] - device charge in percent
//! - [`TrackingSettings`] - user-controlled knobs read from the directory
//! - [`TrackingState`] / [`TrackingStatus`] - observable session status
//! - [`PlaceTransition`] - geofence enter/exit event

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::frequency::TrackingFrequency;
use crate::geo::Coordinate;

/// Identifier of a family member in the directory.
pub type MemberId = String;

/// Identifier of a saved place in the directory.
pub type PlaceId = String;

/// Speed above which a device counts as moving, in meters per second (~1.8 km/h).
pub const MOVING_SPEED_THRESHOLD_MPS: f64 = 0.5;

/// A single fix from the platform location provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy radius in meters, when the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Ground speed in meters per second, when the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            speed: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Battery charge in percent, clamped to 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    /// Below this level the engine trades precision for battery.
    pub const LOW: u8 = 30;

    /// Below this level accuracy is forced to the lowest tier.
    pub const CRITICAL: u8 = 15;

    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    #[inline]
    pub fn percent(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_low(self) -> bool {
        self.0 < Self::LOW
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Position report emitted to the directory for an accepted sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub member_id: MemberId,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
}

impl LocationUpdate {
    pub fn from_sample(
        member_id: impl Into<MemberId>,
        sample: &PositionSample,
        battery: Option<BatteryLevel>,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.timestamp,
            accuracy: sample.accuracy,
            battery: battery.map(BatteryLevel::percent),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// User-configured tracking settings, owned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub frequency: TrackingFrequency,
    /// When on, no position is sampled or reported.
    pub privacy_mode: bool,
    /// Widen the significance threshold while the device is stationary.
    pub pause_when_stationary: bool,
    /// Degrade requested accuracy while the app is backgrounded.
    pub reduced_accuracy_when_background: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            frequency: TrackingFrequency::Medium,
            privacy_mode: false,
            pause_when_stationary: true,
            reduced_accuracy_when_background: true,
        }
    }
}

impl TrackingSettings {
    /// True if a change from `self` to `other` affects the subscription parameters.
    pub fn cadence_differs(&self, other: &Self) -> bool {
        self.frequency != other.frequency
            || self.pause_when_stationary != other.pause_when_stationary
            || self.reduced_accuracy_when_background != other.reduced_accuracy_when_background
    }
}

/// Foreground/background state of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Active,
    Inactive,
    Background,
}

impl AppState {
    pub fn is_background(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// No subscription.
    #[default]
    Idle,
    /// Awaiting platform permission prompts.
    RequestingPermission,
    /// Subscription open, samples flowing.
    Active,
    /// Privacy mode is on; no subscription until it is turned off.
    Suspended,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::RequestingPermission => write!(f, "Requesting permission"),
            Self::Active => write!(f, "Active"),
            Self::Suspended => write!(f, "Suspended (privacy)"),
        }
    }
}

/// Observable engine status for UI consumers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackingStatus {
    pub state: TrackingState,
    pub is_tracking: bool,
    pub error_msg: Option<String>,
    pub battery_level: Option<BatteryLevel>,
    /// Observed battery drain in percent per day, once enough readings exist.
    pub daily_battery_usage: Option<f64>,
    pub is_moving: bool,
    pub last_update: Option<LocationUpdate>,
}

/// Direction of a geofence crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Entered,
    Exited,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entered => write!(f, "entered"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// A member crossed a place boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceTransition {
    pub member_id: MemberId,
    pub place_id: PlaceId,
    pub place_name: String,
    pub kind: TransitionKind,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_battery_level_clamps() {
        assert_eq!(BatteryLevel::new(150).percent(), 100);
        assert!(BatteryLevel::new(29).is_low());
        assert!(!BatteryLevel::new(30).is_low());
        assert_eq!(BatteryLevel::new(80).to_string(), "80%");
    }

    #[test]
    fn test_location_update_from_sample() {
        let sample = PositionSample::new(1.0, 2.0, t0()).with_accuracy(12.5);
        let update = LocationUpdate::from_sample("alice", &sample, Some(BatteryLevel::new(64)));

        assert_eq!(update.member_id, "alice");
        assert_eq!(update.coordinate(), Coordinate::new(1.0, 2.0));
        assert_eq!(update.timestamp, t0());
        assert_eq!(update.accuracy, Some(12.5));
        assert_eq!(update.battery, Some(64));
    }

    #[test]
    fn test_sample_json_optional_fields() {
        let json = r#"{"latitude":1.0,"longitude":2.0,"timestamp":"2024-05-01T12:00:00Z"}"#;
        let sample: PositionSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.timestamp, t0());
        assert!(sample.speed.is_none());
        assert!(sample.accuracy.is_none());
    }

    #[test]
    fn test_cadence_differs_ignores_privacy() {
        let base = TrackingSettings::default();
        let privacy = TrackingSettings {
            privacy_mode: true,
            ..base.clone()
        };
        let faster = TrackingSettings {
            frequency: TrackingFrequency::High,
            ..base.clone()
        };

        assert!(!base.cadence_differs(&privacy));
        assert!(base.cadence_differs(&faster));
    }

    #[test]
    fn test_app_state_background() {
        assert!(!AppState::Active.is_background());
        assert!(AppState::Inactive.is_background());
        assert!(AppState::Background.is_background());
    }
}
