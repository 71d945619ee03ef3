//! Continuous location watching.
//!
//! [`LocationWatcher::start`] subscribes to a [`LocationSource`] on a
//! background task and forwards every fix to a callback. Sensor errors are
//! logged and swallowed so the last good fix stays usable.
//! [`LocationWatcher::track`] is the common case: it keeps a
//! [`LatestLocation`] cell up to date for the poller to read.
//!
//! Stopping a [`WatchHandle`] guarantees that no callback runs afterwards:
//! each callback executes while holding the handle's liveness lock, and
//! [`WatchHandle::stop`] flips that flag under the same lock.

use std::sync::{Arc, Mutex, PoisonError};

use alert_feed_geo::Coordinate;
use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{LocationError, LocationFix, LocationSource, LocationStatus};

/// Shared "latest known observer position" cell.
///
/// Written by a location watch, read by the alert poller at the start of
/// each cycle. Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct LatestLocation {
    coordinate: Arc<watch::Sender<Option<Coordinate>>>,
    status: Arc<watch::Sender<LocationStatus>>,
}

impl Default for LatestLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestLocation {
    /// An empty cell: no fix yet, status [`LocationStatus::Detecting`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            coordinate: Arc::new(watch::Sender::new(None)),
            status: Arc::new(watch::Sender::new(LocationStatus::Detecting)),
        }
    }

    /// A cell pre-filled with `coordinate`.
    #[must_use]
    pub fn fixed(coordinate: Coordinate) -> Self {
        let latest = Self::new();
        latest.set(coordinate);
        latest
    }

    /// Most recent coordinate, or `None` before the first fix.
    #[must_use]
    pub fn get(&self) -> Option<Coordinate> {
        *self.coordinate.borrow()
    }

    /// Replaces the stored coordinate.
    pub fn set(&self, coordinate: Coordinate) {
        self.coordinate.send_replace(Some(coordinate));
    }

    /// Current display status of the location subsystem.
    #[must_use]
    pub fn status(&self) -> LocationStatus {
        *self.status.borrow()
    }

    /// Receiver that is notified whenever the coordinate changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Coordinate>> {
        self.coordinate.subscribe()
    }

    fn record(&self, reading: Result<LocationFix, LocationError>) {
        match reading {
            Ok(fix) => {
                self.set(fix.coordinate);
                self.status.send_replace(LocationStatus::Captured {
                    accuracy_m: fix.accuracy_m,
                });
            }
            Err(e) => {
                // Keep the last good coordinate; only the status changes.
                self.status.send_replace(LocationStatus::Failed(e));
            }
        }
    }
}

/// Handle to a running location subscription.
///
/// Dropping the handle stops the subscription.
#[derive(Debug)]
pub struct WatchHandle {
    alive: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Releases the sensor subscription. Safe to call any number of times.
    pub fn stop(&self) {
        let mut alive = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        if *alive {
            log::debug!("Stopping location watch");
            *alive = false;
        }
        drop(alive);
        self.task.abort();
    }

    /// Returns `true` until [`WatchHandle::stop`] is called or the
    /// underlying stream ends.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.alive.lock().unwrap_or_else(PoisonError::into_inner) && !self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Entry points for starting location subscriptions.
pub struct LocationWatcher;

impl LocationWatcher {
    /// Starts watching `source`, calling `on_update` for every new fix.
    ///
    /// Error readings are logged and otherwise ignored. Must be called from
    /// within a tokio runtime.
    pub fn start<S, F>(source: &S, on_update: F) -> WatchHandle
    where
        S: LocationSource + ?Sized,
        F: Fn(Coordinate) + Send + 'static,
    {
        spawn_watch(source, move |reading| {
            if let Ok(fix) = reading {
                on_update(fix.coordinate);
            }
        })
    }

    /// Starts watching `source` and keeps `latest` up to date, including
    /// its display status.
    pub fn track<S>(source: &S, latest: &LatestLocation) -> WatchHandle
    where
        S: LocationSource + ?Sized,
    {
        let latest = latest.clone();
        spawn_watch(source, move |reading| latest.record(reading))
    }
}

fn spawn_watch<S, F>(source: &S, on_reading: F) -> WatchHandle
where
    S: LocationSource + ?Sized,
    F: Fn(Result<LocationFix, LocationError>) + Send + 'static,
{
    let mut stream = source.watch();
    let alive = Arc::new(Mutex::new(true));
    let task_alive = alive.clone();

    let task = tokio::spawn(async move {
        while let Some(reading) = stream.next().await {
            match &reading {
                Ok(fix) => log::trace!("Location fix {}", fix.coordinate),
                Err(e) => log::warn!("Location reading failed: {e}"),
            }

            let alive = task_alive.lock().unwrap_or_else(PoisonError::into_inner);
            if !*alive {
                return;
            }
            on_reading(reading);
        }
        log::debug!("Location stream ended");
    });

    WatchHandle { alive, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocationStream;
    use futures::StreamExt;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ReceiverStream<T>(mpsc::UnboundedReceiver<T>);

    impl<T> futures::Stream for ReceiverStream<T> {
        type Item = T;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
            self.0.poll_recv(cx)
        }
    }

    type Reading = Result<LocationFix, LocationError>;

    struct ChannelSource(Mutex<Option<mpsc::UnboundedReceiver<Reading>>>);

    impl ChannelSource {
        fn new() -> (mpsc::UnboundedSender<Reading>, Self) {
            let (tx, rx) = mpsc::unbounded_channel();
            (tx, Self(Mutex::new(Some(rx))))
        }
    }

    impl LocationSource for ChannelSource {
        fn watch(&self) -> LocationStream {
            let rx = self.0.lock().unwrap().take().expect("watched twice");
            ReceiverStream(rx).boxed()
        }
    }

    fn fix(lat: f64, lng: f64) -> Reading {
        Ok(LocationFix::new(Coordinate::new(lat, lng), Some(5.0)))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn track_keeps_last_good_fix_through_errors() {
        let (tx, source) = ChannelSource::new();
        let latest = LatestLocation::new();
        let handle = LocationWatcher::track(&source, &latest);

        assert_eq!(latest.get(), None);
        assert_eq!(latest.status(), LocationStatus::Detecting);

        tx.send(fix(1.0, 2.0)).unwrap();
        wait_for(|| latest.get() == Some(Coordinate::new(1.0, 2.0))).await;
        assert_eq!(latest.status(), LocationStatus::Captured { accuracy_m: Some(5.0) });

        tx.send(Err(LocationError::Timeout)).unwrap();
        wait_for(|| latest.status() == LocationStatus::Failed(LocationError::Timeout)).await;
        assert_eq!(latest.get(), Some(Coordinate::new(1.0, 2.0)));
        assert!(handle.is_active());

        tx.send(fix(3.0, 4.0)).unwrap();
        wait_for(|| latest.get() == Some(Coordinate::new(3.0, 4.0))).await;

        handle.stop();
    }

    #[tokio::test]
    async fn start_forwards_only_fixes() {
        let (tx, source) = ChannelSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = LocationWatcher::start(&source, move |c| sink.lock().unwrap().push(c));

        tx.send(Err(LocationError::PermissionDenied)).unwrap();
        tx.send(fix(5.0, 6.0)).unwrap();
        wait_for(|| !seen.lock().unwrap().is_empty()).await;

        assert_eq!(*seen.lock().unwrap(), vec![Coordinate::new(5.0, 6.0)]);
        handle.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_blocks_late_updates() {
        let (tx, source) = ChannelSource::new();
        let latest = LatestLocation::new();
        let handle = LocationWatcher::track(&source, &latest);

        tx.send(fix(1.0, 1.0)).unwrap();
        wait_for(|| latest.get().is_some()).await;

        handle.stop();
        handle.stop();
        assert!(!handle.is_active());

        // The task is gone, so the send may fail; either way nothing lands.
        let _ = tx.send(fix(9.0, 9.0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(latest.get(), Some(Coordinate::new(1.0, 1.0)));
    }

    #[test]
    fn fixed_cell_starts_populated() {
        let latest = LatestLocation::fixed(Coordinate::new(0.5, 0.5));
        assert_eq!(latest.get(), Some(Coordinate::new(0.5, 0.5)));
        let shared = latest.clone();
        shared.set(Coordinate::new(1.5, 1.5));
        assert_eq!(latest.get(), Some(Coordinate::new(1.5, 1.5)));
    }
}
