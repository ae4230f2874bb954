//! Geofence evaluation and enter/exit transition detection.
//!
//! [`evaluate`] is a stateless membership test. [`GeofenceTracker`] remembers
//! which places each member is currently inside and emits a transition only
//! when that membership changes, so repeated samples inside a place do not
//! produce duplicate notifications.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::state::{MemberId, PlaceId, PlaceTransition, TransitionKind};
use crate::geo::{is_within_radius, Coordinate, Place};

/// Membership of a point in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceMembership {
    pub place_id: PlaceId,
    pub inside: bool,
}

/// Test `point` against every place independently.
pub fn evaluate(point: Coordinate, places: &[Place]) -> Vec<PlaceMembership> {
    places
        .iter()
        .map(|place| PlaceMembership {
            place_id: place.id.clone(),
            inside: is_within_radius(point, place),
        })
        .collect()
}

/// Per-member memory of currently-occupied places.
#[derive(Debug, Default)]
pub struct GeofenceTracker {
    previously_inside: HashMap<MemberId, HashSet<PlaceId>>,
}

impl GeofenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `member_id` is currently known to be inside.
    pub fn inside(&self, member_id: &str) -> Option<&HashSet<PlaceId>> {
        self.previously_inside.get(member_id)
    }

    /// Evaluate `point` and return the crossings since the previous evaluation.
    ///
    /// The first evaluation for a member reports `Entered` for every place
    /// that contains the point. Places missing from `places` are forgotten
    /// without an exit event.
    pub fn transitions(
        &mut self,
        member_id: &str,
        point: Coordinate,
        places: &[Place],
        timestamp: DateTime<Utc>,
    ) -> Vec<PlaceTransition> {
        let previous = self
            .previously_inside
            .entry(member_id.to_string())
            .or_default();

        let mut now_inside = HashSet::with_capacity(previous.len());
        let mut transitions = Vec::new();

        for place in places {
            let inside = is_within_radius(point, place);
            let was_inside = previous.contains(&place.id);

            if inside {
                now_inside.insert(place.id.clone());
            }

            let kind = match (was_inside, inside) {
                (false, true) => TransitionKind::Entered,
                (true, false) => TransitionKind::Exited,
                _ => continue,
            };

            tracing::info!(
                member = member_id,
                place = %place.name,
                %kind,
                "Place boundary crossed"
            );

            transitions.push(PlaceTransition {
                member_id: member_id.to_string(),
                place_id: place.id.clone(),
                place_name: place.name.clone(),
                kind,
                latitude: point.latitude,
                longitude: point.longitude,
                timestamp,
            });
        }

        *previous = now_inside;
        transitions
    }

    /// Forget a member's membership (next evaluation starts cold).
    pub fn reset_member(&mut self, member_id: &str) {
        self.previously_inside.remove(member_id);
    }
}
