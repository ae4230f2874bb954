//! Replay provider - plays a recorded track through the engine.
//!
//! Used by the CLI `replay` command and by tests. Steps are consumed from a
//! shared cursor, so a re-attached subscription continues where the previous
//! one stopped instead of starting the track over.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::error::ProviderError;
use super::policy::{AccuracyTier, WatchOptions};
use super::provider::{LocationProvider, PermissionStatus, SampleSink, Subscription};
use super::state::PositionSample;

/// One entry of a recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    Fix(PositionSample),
    Fail { error: String },
}

impl From<PositionSample> for ReplayStep {
    fn from(sample: PositionSample) -> Self {
        Self::Fix(sample)
    }
}

/// What the provider was asked to do, for assertions.
#[derive(Debug, Clone, Default)]
pub struct ReplayLog {
    /// Options of every `watch_position` call, in order.
    pub watches: Vec<WatchOptions>,
    /// Options of every accepted `reconfigure` call.
    pub reconfigures: Vec<WatchOptions>,
    /// Accuracy of every `current_position` call.
    pub one_shots: Vec<AccuracyTier>,
}

/// [`LocationProvider`] backed by a recorded list of steps.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    steps: Arc<Vec<ReplayStep>>,
    cursor: Arc<AtomicUsize>,
    pace: Duration,
    foreground: PermissionStatus,
    background: PermissionStatus,
    reconfigurable: bool,
    log: Arc<Mutex<ReplayLog>>,
    exhausted: Arc<watch::Sender<bool>>,
}

impl ReplayProvider {
    /// Replay `samples` back to back with permissions granted.
    pub fn new(samples: Vec<PositionSample>) -> Self {
        Self::from_steps(samples.into_iter().map(ReplayStep::from).collect())
    }

    pub fn from_steps(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps: Arc::new(steps),
            cursor: Arc::new(AtomicUsize::new(0)),
            pace: Duration::ZERO,
            foreground: PermissionStatus::Granted,
            background: PermissionStatus::Granted,
            reconfigurable: false,
            log: Arc::new(Mutex::new(ReplayLog::default())),
            exhausted: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Delay before each step is delivered.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn with_permissions(mut self, foreground: PermissionStatus, background: PermissionStatus) -> Self {
        self.foreground = foreground;
        self.background = background;
        self
    }

    /// Accept in-place reconfiguration instead of forcing a restart.
    pub fn with_reconfigure(mut self, supported: bool) -> Self {
        self.reconfigurable = supported;
        self
    }

    /// Wait until a subscription has delivered the last step of the track.
    ///
    /// Every delivered step is queued on its sink by the time this returns.
    pub async fn wait_until_exhausted(&self) {
        let mut done = self.exhausted.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = done.wait_for(|exhausted| *exhausted).await;
    }

    pub fn log(&self) -> ReplayLog {
        self.log.lock().unwrap().clone()
    }

    fn next_step(&self) -> Option<ReplayStep> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.steps.get(index).cloned()
    }
}

impl LocationProvider for ReplayProvider {
    async fn request_foreground_permission(&self) -> PermissionStatus {
        self.foreground
    }

    async fn request_background_permission(&self) -> PermissionStatus {
        self.background
    }

    async fn watch_position(
        &self,
        options: WatchOptions,
        sink: SampleSink,
    ) -> Result<Subscription, ProviderError> {
        if !self.foreground.is_granted() {
            return Err(ProviderError::PermissionRevoked);
        }

        self.log.lock().unwrap().watches.push(options);

        let subscription = Subscription::new(sink.generation());
        let token = subscription.token();
        let provider = self.clone();

        tokio::spawn(async move {
            tracing::debug!(generation = sink.generation(), "Replay started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(provider.pace) => {}
                }

                // Re-check: the pace sleep may have finished as the release landed
                if token.is_cancelled() {
                    break;
                }

                let delivered = match provider.next_step() {
                    Some(ReplayStep::Fix(sample)) => sink.send(sample).await,
                    Some(ReplayStep::Fail { error }) => {
                        sink.send_error(ProviderError::Other(error)).await
                    }
                    None => {
                        provider.exhausted.send_replace(true);
                        break;
                    }
                };

                if !delivered {
                    break;
                }
            }
            tracing::debug!(generation = sink.generation(), "Replay finished");
        });

        Ok(subscription)
    }

    async fn reconfigure(&self, _subscription: &Subscription, options: WatchOptions) -> bool {
        if self.reconfigurable {
            self.log.lock().unwrap().reconfigures.push(options);
        }
        self.reconfigurable
    }

    async fn current_position(&self, accuracy: AccuracyTier) -> Result<PositionSample, ProviderError> {
        self.log.lock().unwrap().one_shots.push(accuracy);

        match self.next_step() {
            Some(ReplayStep::Fix(sample)) => Ok(sample),
            Some(ReplayStep::Fail { error }) => Err(ProviderError::Other(error)),
            None => Err(ProviderError::Unavailable("replay track exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::frequency::TrackingFrequency;
    use crate::tracking::policy::watch_options;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn track(n: usize) -> Vec<PositionSample> {
        (0..n)
            .map(|i| PositionSample::new(i as f64 * 0.001, 0.0, Utc::now()))
            .collect()
    }

    fn options() -> WatchOptions {
        watch_options(None, TrackingFrequency::Medium, false, false)
    }

    #[tokio::test]
    async fn test_replays_track_in_order() {
        let provider = ReplayProvider::new(track(3));
        let (tx, mut rx) = mpsc::channel(8);

        let subscription = provider
            .watch_position(options(), SampleSink::new(1, tx))
            .await
            .unwrap();
        assert_eq!(subscription.generation(), 1);

        for i in 0..3 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.generation, 1);
            assert_eq!(event.result.unwrap().latitude, i as f64 * 0.001);
        }
        assert_eq!(provider.log().watches, vec![options()]);
    }

    #[tokio::test]
    async fn test_wait_until_exhausted() {
        let provider = ReplayProvider::new(track(2));
        let (tx, mut rx) = mpsc::channel(8);
        provider
            .watch_position(options(), SampleSink::new(1, tx))
            .await
            .unwrap();

        provider.wait_until_exhausted().await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_fail_step_becomes_provider_error() {
        let provider = ReplayProvider::from_steps(vec![ReplayStep::Fail {
            error: "gps lost".into(),
        }]);
        let (tx, mut rx) = mpsc::channel(8);
        provider
            .watch_position(options(), SampleSink::new(1, tx))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.result, Err(ProviderError::Other("gps lost".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stops_delivery() {
        let provider = ReplayProvider::new(track(5)).with_pace(Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(8);

        let subscription = provider
            .watch_position(options(), SampleSink::new(1, tx))
            .await
            .unwrap();
        assert!(rx.recv().await.is_some());

        subscription.release();
        // Delivery task drops the sender once it observes the release
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_denied_foreground_refuses_watch() {
        let provider = ReplayProvider::new(track(1))
            .with_permissions(PermissionStatus::Denied, PermissionStatus::Denied);
        let (tx, _rx) = mpsc::channel(1);

        let result = provider.watch_position(options(), SampleSink::new(1, tx)).await;
        assert_eq!(result.unwrap_err(), ProviderError::PermissionRevoked);
    }

    #[tokio::test]
    async fn test_current_position_consumes_track() {
        let provider = ReplayProvider::new(track(1));

        assert!(provider.current_position(AccuracyTier::Balanced).await.is_ok());
        assert!(matches!(
            provider.current_position(AccuracyTier::Lowest).await,
            Err(ProviderError::Unavailable(_))
        ));
        assert_eq!(
            provider.log().one_shots,
            vec![AccuracyTier::Balanced, AccuracyTier::Lowest]
        );
    }

    #[test]
    fn test_step_json_forms() {
        let json = r#"[
            {"latitude": 1.0, "longitude": 2.0, "timestamp": "2024-05-01T12:00:00Z"},
            {"error": "no fix"}
        ]"#;
        let steps: Vec<ReplayStep> = serde_json::from_str(json).unwrap();

        assert!(matches!(steps[0], ReplayStep::Fix(_)));
        assert_eq!(
            steps[1],
            ReplayStep::Fail {
                error: "no fix".into()
            }
        );
    }
}
