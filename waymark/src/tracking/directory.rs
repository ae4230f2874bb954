//! Directory seam - where members, places and settings live.
//!
//! The engine reads the signed-in member, saved places and tracking settings
//! from a [`Directory`] and writes accepted updates back to it. Storage is the
//! host application's concern; [`InMemoryDirectory`] is provided for tests
//! and the CLI.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::state::{BatteryLevel, LocationUpdate, MemberId, PlaceTransition, TrackingSettings};
use crate::geo::{Coordinate, Place};

/// Member/place/settings store consumed by the controller.
pub trait Directory: Send + Sync {
    /// Signed-in member, if any.
    fn current_user_id(&self) -> Option<MemberId>;

    /// Saved places to evaluate as geofences.
    fn places(&self) -> Vec<Place>;

    fn settings(&self) -> TrackingSettings;

    fn last_reported_location(&self) -> Option<Coordinate>;

    fn set_last_reported_location(&self, location: Coordinate);

    /// Store an accepted position report.
    fn record_location(&self, update: LocationUpdate);

    /// Store a battery-only member update.
    fn record_battery(&self, member_id: &str, level: BatteryLevel, at: DateTime<Utc>);

    /// Store a geofence crossing.
    fn record_place_transition(&self, transition: PlaceTransition);
}

/// Battery-only member update as stored by [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryReport {
    pub member_id: MemberId,
    pub level: BatteryLevel,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    current_user: Option<MemberId>,
    places: Vec<Place>,
    settings: TrackingSettings,
    last_reported: Option<Coordinate>,
    locations: Vec<LocationUpdate>,
    battery_reports: Vec<BatteryReport>,
    transitions: Vec<PlaceTransition>,
}

/// Thread-safe in-memory [`Directory`].
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    inner: Arc<RwLock<DirectoryState>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory with `member_id` signed in and default settings.
    pub fn with_user(member_id: impl Into<MemberId>) -> Self {
        let directory = Self::new();
        directory.set_current_user(Some(member_id.into()));
        directory
    }

    pub fn set_current_user(&self, member_id: Option<MemberId>) {
        self.inner.write().unwrap().current_user = member_id;
    }

    pub fn set_places(&self, places: Vec<Place>) {
        self.inner.write().unwrap().places = places;
    }

    pub fn set_settings(&self, settings: TrackingSettings) {
        self.inner.write().unwrap().settings = settings;
    }

    /// Apply `f` to the stored settings and return the result.
    pub fn update_settings(&self, f: impl FnOnce(&mut TrackingSettings)) -> TrackingSettings {
        let mut state = self.inner.write().unwrap();
        f(&mut state.settings);
        state.settings.clone()
    }

    /// All recorded position reports, oldest first.
    pub fn locations(&self) -> Vec<LocationUpdate> {
        self.inner.read().unwrap().locations.clone()
    }

    pub fn battery_reports(&self) -> Vec<BatteryReport> {
        self.inner.read().unwrap().battery_reports.clone()
    }

    pub fn transitions(&self) -> Vec<PlaceTransition> {
        self.inner.read().unwrap().transitions.clone()
    }
}

impl Directory for InMemoryDirectory {
    fn current_user_id(&self) -> Option<MemberId> {
        self.inner.read().unwrap().current_user.clone()
    }

    fn places(&self) -> Vec<Place> {
        self.inner.read().unwrap().places.clone()
    }

    fn settings(&self) -> TrackingSettings {
        self.inner.read().unwrap().settings.clone()
    }

    fn last_reported_location(&self) -> Option<Coordinate> {
        self.inner.read().unwrap().last_reported
    }

    fn set_last_reported_location(&self, location: Coordinate) {
        self.inner.write().unwrap().last_reported = Some(location);
    }

    fn record_location(&self, update: LocationUpdate) {
        self.inner.write().unwrap().locations.push(update);
    }

    fn record_battery(&self, member_id: &str, level: BatteryLevel, at: DateTime<Utc>) {
        self.inner.write().unwrap().battery_reports.push(BatteryReport {
            member_id: member_id.to_string(),
            level,
            at,
        });
    }

    fn record_place_transition(&self, transition: PlaceTransition) {
        self.inner.write().unwrap().transitions.push(transition);
    }
}
