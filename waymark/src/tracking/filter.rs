//! Significance filter - decides whether a raw sample is worth reporting.
//!
//! The base threshold is the tier's distance interval. It is scaled up when
//! the battery is low (×2) and when the device is stationary with
//! "pause when stationary" enabled (×3). Scalings multiply, so a stationary
//! device on a low battery needs to move six times the base distance.

use super::frequency::TrackingFrequency;
use super::state::{BatteryLevel, PositionSample};
use crate::geo::{approx_distance_m, Coordinate};

/// Threshold multiplier applied when the battery is below [`BatteryLevel::LOW`].
pub const LOW_BATTERY_MULTIPLIER: f64 = 2.0;

/// Threshold multiplier applied while stationary with pausing enabled.
pub const STATIONARY_MULTIPLIER: f64 = 3.0;

/// Distance a sample must move before it is reported, in meters.
pub fn effective_threshold_m(
    frequency: TrackingFrequency,
    battery: Option<BatteryLevel>,
    is_moving: bool,
    pause_when_stationary: bool,
) -> f64 {
    let mut threshold = f64::from(frequency.config().distance_interval_m);

    if battery.is_some_and(BatteryLevel::is_low) {
        threshold *= LOW_BATTERY_MULTIPLIER;
    }

    if !is_moving && pause_when_stationary {
        threshold *= STATIONARY_MULTIPLIER;
    }

    threshold
}

/// Returns true if `sample` moved far enough from `last_reported` to report.
///
/// The first fix (no previous report) is always accepted. The boundary is
/// inclusive: moving exactly the threshold distance is reported.
pub fn should_report(
    sample: &PositionSample,
    last_reported: Option<Coordinate>,
    frequency: TrackingFrequency,
    battery: Option<BatteryLevel>,
    is_moving: bool,
    pause_when_stationary: bool,
) -> bool {
    let Some(last) = last_reported else {
        return true;
    };

    let distance = approx_distance_m(
        last.latitude,
        last.longitude,
        sample.latitude,
        sample.longitude,
    );
    let threshold = effective_threshold_m(frequency, battery, is_moving, pause_when_stationary);

    tracing::trace!(
        distance_m = format!("{:.1}", distance),
        threshold_m = threshold,
        %frequency,
        is_moving,
        "Significance check"
    );

    distance >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::METERS_PER_DEGREE;
    use chrono::Utc;
    use proptest::prelude::*;

    /// Sample `meters` north of the origin, measured with the planar approximation.
    fn sample_north_of_origin(meters: f64) -> PositionSample {
        PositionSample::new(meters / METERS_PER_DEGREE, 0.0, Utc::now())
    }

    const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);

    #[test]
    fn test_first_fix_always_reported() {
        for frequency in TrackingFrequency::ALL {
            assert!(should_report(
                &sample_north_of_origin(0.0),
                None,
                frequency,
                Some(BatteryLevel::new(1)),
                false,
                true,
            ));
        }
    }

    #[test]
    fn test_base_threshold_boundary_is_inclusive() {
        let battery = Some(BatteryLevel::new(80));
        for frequency in TrackingFrequency::ALL {
            let base = f64::from(frequency.config().distance_interval_m);

            assert!(should_report(
                &sample_north_of_origin(base),
                Some(ORIGIN),
                frequency,
                battery,
                true,
                true,
            ));
            assert!(!should_report(
                &sample_north_of_origin(base - 0.5),
                Some(ORIGIN),
                frequency,
                battery,
                true,
                true,
            ));
        }
    }

    #[test]
    fn test_low_battery_doubles_threshold() {
        let threshold =
            effective_threshold_m(TrackingFrequency::Medium, Some(BatteryLevel::new(29)), true, true);
        assert_eq!(threshold, 40.0);

        let threshold =
            effective_threshold_m(TrackingFrequency::Medium, Some(BatteryLevel::new(30)), true, true);
        assert_eq!(threshold, 20.0);
    }

    #[test]
    fn test_unknown_battery_does_not_scale() {
        let threshold = effective_threshold_m(TrackingFrequency::Medium, None, true, true);
        assert_eq!(threshold, 20.0);
    }

    #[test]
    fn test_stationary_triples_only_when_pausing() {
        assert_eq!(
            effective_threshold_m(TrackingFrequency::Medium, None, false, true),
            60.0
        );
        assert_eq!(
            effective_threshold_m(TrackingFrequency::Medium, None, false, false),
            20.0
        );
    }

    #[test]
    fn test_low_battery_and_stationary_compound_to_six_times() {
        let battery = Some(BatteryLevel::new(10));
        let threshold = effective_threshold_m(TrackingFrequency::Medium, battery, false, true);
        assert_eq!(threshold, 120.0);

        assert!(!should_report(
            &sample_north_of_origin(119.0),
            Some(ORIGIN),
            TrackingFrequency::Medium,
            battery,
            false,
            true,
        ));
        assert!(should_report(
            &sample_north_of_origin(120.0),
            Some(ORIGIN),
            TrackingFrequency::Medium,
            battery,
            false,
            true,
        ));
    }

    fn any_frequency() -> impl Strategy<Value = TrackingFrequency> {
        prop::sample::select(TrackingFrequency::ALL.to_vec())
    }

    proptest! {
        /// Property: scaling only ever raises the threshold above the tier base.
        #[test]
        fn prop_threshold_never_below_base(
            frequency in any_frequency(),
            battery in prop::option::of(0u8..=100),
            is_moving in any::<bool>(),
            pause in any::<bool>(),
        ) {
            let base = f64::from(frequency.config().distance_interval_m);
            let threshold =
                effective_threshold_m(frequency, battery.map(BatteryLevel::new), is_moving, pause);
            prop_assert!(threshold >= base);
            prop_assert!(threshold <= base * LOW_BATTERY_MULTIPLIER * STATIONARY_MULTIPLIER);
        }

        /// Property: a sample accepted at some distance is accepted further out.
        #[test]
        fn prop_acceptance_monotonic_in_distance(
            frequency in any_frequency(),
            meters in 0.0f64..500.0,
            extra in 0.0f64..500.0,
        ) {
            let accepted = |m: f64| should_report(
                &sample_north_of_origin(m),
                Some(ORIGIN),
                frequency,
                None,
                false,
                true,
            );
            if accepted(meters) {
                prop_assert!(accepted(meters + extra));
            }
        }
    }
}
