//! Movement detector - classifies the device as moving or stationary.
//!
//! Runs on every raw sample, accepted or not. Platform speed is trusted when
//! present; otherwise speed is derived from the distance to the last reported
//! location over the time since that report.

use chrono::{DateTime, Utc};

use super::state::{PositionSample, MOVING_SPEED_THRESHOLD_MPS};
use crate::geo::{distance_between, Coordinate};

/// Movement classification plus the time of the last accepted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementState {
    pub is_moving: bool,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Tracks moving/stationary state across samples.
#[derive(Debug, Default)]
pub struct MovementDetector {
    state: MovementState,
}

impl MovementDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        self.state.is_moving
    }

    /// Classify `sample` against the last reported location.
    ///
    /// Without a reference the state is left unchanged (a cold detector
    /// reports not moving). Returns the resulting `is_moving`.
    pub fn update(&mut self, sample: &PositionSample, reference: Option<Coordinate>) -> bool {
        let Some(reference) = reference else {
            return self.state.is_moving;
        };

        if let Some(speed) = sample.speed {
            self.set_moving(speed > MOVING_SPEED_THRESHOLD_MPS, speed);
            return self.state.is_moving;
        }

        let Some(last_updated_at) = self.state.last_updated_at else {
            return self.state.is_moving;
        };

        let elapsed_ms = (sample.timestamp - last_updated_at).num_milliseconds();
        if elapsed_ms <= 0 {
            return self.state.is_moving;
        }

        let distance = distance_between(reference, sample.coordinate());
        let speed = distance / (elapsed_ms as f64 / 1000.0);
        self.set_moving(speed > MOVING_SPEED_THRESHOLD_MPS, speed);

        self.state.is_moving
    }

    /// Record that a sample taken at `timestamp` was reported.
    pub fn record_report(&mut self, timestamp: DateTime<Utc>) {
        self.state.last_updated_at = Some(timestamp);
    }

    /// Forget everything (cold start).
    pub fn reset(&mut self) {
        self.state = MovementState::default();
    }

    fn set_moving(&mut self, moving: bool, speed: f64) {
        if moving != self.state.is_moving {
            tracing::debug!(
                speed_mps = format!("{:.2}", speed),
                moving,
                "Movement state changed"
            );
        }
        self.state.is_moving = moving;
    }
}
