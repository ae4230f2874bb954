//! Location provider seam.
//!
//! The platform location service is abstracted behind [`LocationProvider`].
//! A continuous subscription pushes fixes into a [`SampleSink`]; every sink
//! is stamped with the session generation that opened it, so the controller
//! can discard anything a stopped session delivers late.
//!
//! ```text
//! provider task ──SampleSink(gen N)──► mpsc ──► TrackingService ──► controller
//!                                                   │
//!                              drops events where gen != current
//! ```

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::ProviderError;
use super::policy::{AccuracyTier, WatchOptions};
use super::state::PositionSample;

/// Monotonic session counter; bumped on every start and stop.
pub type Generation = u64;

/// Outcome of a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// One delivery from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: Generation,
    pub result: Result<PositionSample, ProviderError>,
}

/// Sending half handed to a provider when a subscription opens.
#[derive(Debug, Clone)]
pub struct SampleSink {
    generation: Generation,
    tx: mpsc::Sender<SessionEvent>,
}

impl SampleSink {
    pub fn new(generation: Generation, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Deliver a fix. Returns `false` once the consumer is gone.
    pub async fn send(&self, sample: PositionSample) -> bool {
        self.deliver(Ok(sample)).await
    }

    /// Deliver a provider failure. Returns `false` once the consumer is gone.
    pub async fn send_error(&self, error: ProviderError) -> bool {
        self.deliver(Err(error)).await
    }

    async fn deliver(&self, result: Result<PositionSample, ProviderError>) -> bool {
        let event = SessionEvent {
            generation: self.generation,
            result,
        };
        self.tx.send(event).await.is_ok()
    }
}

/// Handle for the single live position stream.
///
/// Releasing cancels the token the provider's delivery task watches. Late
/// deliveries that race the release are still discarded by generation.
#[derive(Debug, Clone)]
pub struct Subscription {
    generation: Generation,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            cancel: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Token the provider ties its delivery task to.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn release(&self) {
        self.cancel.cancel();
    }

    pub fn is_released(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.generation)
    }
}

/// Platform location service.
pub trait LocationProvider: Send + Sync {
    /// Ask for while-in-use access. Required to track at all.
    fn request_foreground_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// Ask for background access. Denial is not fatal.
    fn request_background_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// Open a continuous subscription delivering into `sink`.
    ///
    /// The returned subscription must carry `sink.generation()`.
    fn watch_position(
        &self,
        options: WatchOptions,
        sink: SampleSink,
    ) -> impl Future<Output = Result<Subscription, ProviderError>> + Send;

    /// Apply new options to a live subscription.
    ///
    /// Returns `false` when the platform cannot update in place; the
    /// controller then restarts the subscription.
    fn reconfigure(
        &self,
        subscription: &Subscription,
        options: WatchOptions,
    ) -> impl Future<Output = bool> + Send {
        let _ = (subscription, options);
        async { false }
    }

    /// Single immediate fix.
    fn current_position(
        &self,
        accuracy: AccuracyTier,
    ) -> impl Future<Output = Result<PositionSample, ProviderError>> + Send;
}
