//! Concrete [`LocationSource`] implementations.
//!
//! * [`StaticLocationSource`] reports one fixed position and then stays
//!   quiet, like a stationary device.
//! * [`ReplayLocationSource`] replays platform readings from a JSON-lines
//!   file, one reading per line:
//!
//! ```text
//! {"latitude": 4.0511, "longitude": 9.7679, "accuracy": 12.0}
//! {"error": "timeout"}
//! {"error": "permission_denied"}
//! ```

use std::path::PathBuf;
use std::time::Duration;

use alert_feed_geo::Coordinate;
use futures::StreamExt as _;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt as _, BufReader, Lines};

use crate::{LocationError, LocationFix, LocationSource, LocationStream};

/// Reports a single fixed position on every subscription.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocationSource {
    fix: LocationFix,
}

impl StaticLocationSource {
    #[must_use]
    pub const fn new(fix: LocationFix) -> Self {
        Self { fix }
    }

    #[must_use]
    pub const fn at(coordinate: Coordinate) -> Self {
        Self::new(LocationFix::new(coordinate, None))
    }
}

impl LocationSource for StaticLocationSource {
    fn watch(&self) -> LocationStream {
        // The subscription stays open after the single fix, like a
        // platform watch on a device that isn't moving.
        futures::stream::once(futures::future::ready(Ok(self.fix)))
            .chain(futures::stream::pending())
            .boxed()
    }
}

/// One line of a replay file, in the platform's own field names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PlatformReading {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy: Option<f64>,
    },
    Error {
        error: PlatformErrorCode,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PlatformErrorCode {
    PermissionDenied,
    Timeout,
    Unavailable,
}

impl From<PlatformErrorCode> for LocationError {
    fn from(code: PlatformErrorCode) -> Self {
        match code {
            PlatformErrorCode::PermissionDenied => Self::PermissionDenied,
            PlatformErrorCode::Timeout => Self::Timeout,
            PlatformErrorCode::Unavailable => Self::Unavailable,
        }
    }
}

impl From<PlatformReading> for Result<LocationFix, LocationError> {
    fn from(reading: PlatformReading) -> Self {
        match reading {
            PlatformReading::Fix {
                latitude,
                longitude,
                accuracy,
            } => Ok(LocationFix::new(Coordinate::new(latitude, longitude), accuracy)),
            PlatformReading::Error { error } => Err(error.into()),
        }
    }
}

/// Replays readings from a JSON-lines file.
///
/// Each subscription reopens the file from the start. Blank lines are
/// skipped; lines that aren't valid readings are logged and skipped. When
/// the file is exhausted the stream ends.
#[derive(Debug, Clone)]
pub struct ReplayLocationSource {
    path: PathBuf,
    interval: Option<Duration>,
}

impl ReplayLocationSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: None,
        }
    }

    /// Waits `interval` before emitting each reading after the first.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

enum ReplayState {
    Closed(PathBuf),
    Open {
        lines: Lines<BufReader<tokio::fs::File>>,
        emitted: bool,
    },
    Done,
}

impl LocationSource for ReplayLocationSource {
    fn watch(&self) -> LocationStream {
        let interval = self.interval;

        futures::stream::unfold(ReplayState::Closed(self.path.clone()), move |state| async move {
            let (mut lines, mut emitted) = match state {
                ReplayState::Done => return None,
                ReplayState::Closed(path) => match tokio::fs::File::open(&path).await {
                    Ok(file) => (BufReader::new(file).lines(), false),
                    Err(e) => {
                        log::warn!("Failed to open location replay {}: {e}", path.display());
                        let error = if e.kind() == std::io::ErrorKind::PermissionDenied {
                            LocationError::PermissionDenied
                        } else {
                            LocationError::Unavailable
                        };
                        return Some((Err(error), ReplayState::Done));
                    }
                },
                ReplayState::Open { lines, emitted } => (lines, emitted),
            };

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => return None,
                    Err(e) => {
                        log::warn!("Location replay read failed: {e}");
                        return Some((Err(LocationError::Unavailable), ReplayState::Done));
                    }
                };

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let reading = match serde_json::from_str::<PlatformReading>(line) {
                    Ok(reading) => reading,
                    Err(e) => {
                        log::warn!("Skipping malformed location reading {line:?}: {e}");
                        continue;
                    }
                };

                if emitted {
                    if let Some(interval) = interval {
                        tokio::time::sleep(interval).await;
                    }
                }
                emitted = true;

                return Some((reading.into(), ReplayState::Open { lines, emitted }));
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn replay_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "alert_feed_location_{name}_{}.jsonl",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn replays_fixes_and_errors_in_order() {
        let path = replay_file(
            "mixed",
            "{\"latitude\": 4.05, \"longitude\": 9.7, \"accuracy\": 12.0}\n\
             \n\
             not json\n\
             {\"error\": \"timeout\"}\n\
             {\"latitude\": 4.06, \"longitude\": 9.71}\n",
        );
        let readings: Vec<_> = ReplayLocationSource::new(&path).watch().collect().await;
        std::fs::remove_file(&path).ok();

        assert_eq!(
            readings,
            vec![
                Ok(LocationFix::new(Coordinate::new(4.05, 9.7), Some(12.0))),
                Err(LocationError::Timeout),
                Ok(LocationFix::new(Coordinate::new(4.06, 9.71), None)),
            ]
        );
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let source = ReplayLocationSource::new("/nonexistent/alert-feed/track.jsonl");
        let readings: Vec<_> = source.watch().collect().await;
        assert_eq!(readings, vec![Err(LocationError::Unavailable)]);
    }

    #[tokio::test]
    async fn static_source_emits_once_then_stays_open() {
        let source = StaticLocationSource::at(Coordinate::new(1.0, 2.0));
        let mut stream = source.watch();
        assert_eq!(
            stream.next().await,
            Some(Ok(LocationFix::new(Coordinate::new(1.0, 2.0), None)))
        );
        let next = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(next.is_err(), "static source should not end");
    }
}
