#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Observer location tracking for the alert feed.
//!
//! A [`LocationSource`] produces a stream of position readings from some
//! platform sensor. The [`watcher`] module turns that stream into a single
//! "latest known coordinate" cell that the alert poller reads at the start
//! of each cycle. Errors from the sensor never cross the subscription
//! boundary: they are logged, recorded as a [`LocationStatus`], and the
//! last good fix stays in place.
//!
//! [`acquire_fix`] is the one-shot variant used when reporting an alert: it
//! waits a bounded time for a single fix and reports why it failed.

pub mod source;
pub mod watcher;

use std::time::Duration;

use alert_feed_geo::Coordinate;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use thiserror::Error;

pub use watcher::{LatestLocation, LocationWatcher, WatchHandle};

/// Default bounded wait for a single fix.
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(15);

/// A single position reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    /// Reported position.
    pub coordinate: Coordinate,
    /// Accuracy radius in meters, when the sensor reports one.
    pub accuracy_m: Option<f64>,
}

impl LocationFix {
    #[must_use]
    pub const fn new(coordinate: Coordinate, accuracy_m: Option<f64>) -> Self {
        Self {
            coordinate,
            accuracy_m,
        }
    }
}

/// Why a position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or platform refused access to location.
    #[error("location permission denied")]
    PermissionDenied,

    /// No fix arrived within the allotted time.
    #[error("timed out waiting for a location fix")]
    Timeout,

    /// The sensor has no signal or is switched off.
    #[error("location unavailable")]
    Unavailable,
}

impl LocationError {
    /// Short human-readable status for this error class.
    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Permission Denied",
            Self::Timeout => "Location Timeout",
            Self::Unavailable => "Signal Lost",
        }
    }

    /// Longer hint telling the user what to do about it.
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Please enable location services in your device settings to send an accurate alert."
            }
            Self::Timeout => {
                "GPS took too long. Make sure you are not in a dead zone and try again."
            }
            Self::Unavailable => {
                "Unable to find your location. Check that GPS/location is turned on."
            }
        }
    }
}

/// What the location subsystem is currently doing, for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationStatus {
    /// Waiting for the first reading.
    Detecting,
    /// A fix was captured.
    Captured {
        /// Accuracy radius in meters, if known.
        accuracy_m: Option<f64>,
    },
    /// The most recent reading was an error.
    Failed(LocationError),
}

impl std::fmt::Display for LocationStatus {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detecting => f.write_str("Detecting Pinpoint Location..."),
            Self::Captured {
                accuracy_m: Some(accuracy),
            } => write!(f, "Captured (±{}m) ✓", accuracy.round() as i64),
            Self::Captured { accuracy_m: None } => f.write_str("Captured ✓"),
            Self::Failed(e) => f.write_str(e.status()),
        }
    }
}

/// A continuous stream of position readings.
pub type LocationStream = BoxStream<'static, Result<LocationFix, LocationError>>;

/// A platform position sensor.
///
/// Each call to [`LocationSource::watch`] opens a fresh high-accuracy
/// subscription. The stream may interleave errors with fixes and may end
/// when the sensor goes away.
pub trait LocationSource: Send + Sync {
    /// Opens a new position subscription.
    fn watch(&self) -> LocationStream;
}

/// Waits up to `timeout` for a single fix from `source`.
///
/// # Errors
///
/// * [`LocationError::Timeout`] if nothing arrives in time.
/// * The sensor's own error if its first reading is an error.
/// * [`LocationError::Unavailable`] if the stream ends without a reading.
pub async fn acquire_fix<S>(source: &S, timeout: Duration) -> Result<LocationFix, LocationError>
where
    S: LocationSource + ?Sized,
{
    let mut stream = source.watch();

    match tokio::time::timeout(timeout, stream.next()).await {
        Err(_) => {
            log::warn!("No location fix within {timeout:?}");
            Err(LocationError::Timeout)
        }
        Ok(None) => Err(LocationError::Unavailable),
        Ok(Some(reading)) => reading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticLocationSource;
    use futures::StreamExt;

    struct ScriptedSource(Vec<Result<LocationFix, LocationError>>);

    impl LocationSource for ScriptedSource {
        fn watch(&self) -> LocationStream {
            futures::stream::iter(self.0.clone()).boxed()
        }
    }

    struct SilentSource;

    impl LocationSource for SilentSource {
        fn watch(&self) -> LocationStream {
            futures::stream::pending::<Result<LocationFix, LocationError>>().boxed()
        }
    }

    #[test]
    fn status_strings_distinguish_error_classes() {
        assert_eq!(LocationStatus::Failed(LocationError::PermissionDenied).to_string(), "Permission Denied");
        assert_eq!(LocationStatus::Failed(LocationError::Timeout).to_string(), "Location Timeout");
        assert_eq!(LocationStatus::Failed(LocationError::Unavailable).to_string(), "Signal Lost");
        assert_eq!(LocationStatus::Detecting.to_string(), "Detecting Pinpoint Location...");
        assert_eq!(
            LocationStatus::Captured { accuracy_m: Some(12.6) }.to_string(),
            "Captured (±13m) ✓"
        );
    }

    #[tokio::test]
    async fn acquire_fix_returns_first_reading() {
        let fix = LocationFix::new(Coordinate::new(4.05, 9.7), Some(8.0));
        let source = StaticLocationSource::new(fix);
        assert_eq!(acquire_fix(&source, Duration::from_secs(1)).await, Ok(fix));
    }

    #[tokio::test]
    async fn acquire_fix_reports_sensor_error() {
        let source = ScriptedSource(vec![Err(LocationError::PermissionDenied)]);
        assert_eq!(
            acquire_fix(&source, Duration::from_secs(1)).await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn acquire_fix_times_out() {
        assert_eq!(
            acquire_fix(&SilentSource, Duration::from_millis(20)).await,
            Err(LocationError::Timeout)
        );
    }

    #[tokio::test]
    async fn acquire_fix_on_ended_stream_is_unavailable() {
        let source = ScriptedSource(Vec::new());
        assert_eq!(
            acquire_fix(&source, Duration::from_secs(1)).await,
            Err(LocationError::Unavailable)
        );
    }
}
