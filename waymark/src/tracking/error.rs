//! Error types for the tracking engine.

use thiserror::Error;

/// Failures reported by a [`LocationProvider`](super::provider::LocationProvider).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Location services are off or no fix source is available.
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// No fix arrived within the provider's deadline.
    #[error("Timed out waiting for a location fix")]
    Timeout,

    /// Permission was withdrawn while a subscription was open.
    #[error("Location permission revoked")]
    PermissionRevoked,

    /// The fix had non-finite or out-of-range coordinates.
    #[error("Invalid location fix: {0}")]
    InvalidFix(String),

    #[error("Location provider error: {0}")]
    Other(String),
}

/// Errors surfaced by tracking operations.
///
/// Every variant is also recorded as the controller's `error_msg` so UI
/// consumers can show it without inspecting the `Result`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// No member is signed in.
    #[error("No current user")]
    NoCurrentUser,

    /// Foreground location permission was denied.
    #[error("Location permission denied")]
    PermissionDenied,

    /// Privacy mode is on, so positions may not be read.
    #[error("Privacy mode is enabled")]
    PrivacyMode,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The tracking service task has exited.
    #[error("Tracking service stopped")]
    ServiceStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_converts_transparently() {
        let err: TrackingError = ProviderError::Timeout.into();
        assert_eq!(err, TrackingError::Provider(ProviderError::Timeout));
        assert_eq!(err.to_string(), "Timed out waiting for a location fix");
    }

    #[test]
    fn test_messages() {
        assert_eq!(TrackingError::NoCurrentUser.to_string(), "No current user");
        assert_eq!(
            ProviderError::Unavailable("gps off".into()).to_string(),
            "Location unavailable: gps off"
        );
    }
}
