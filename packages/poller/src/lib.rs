#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Periodic refresh loop that keeps the ranked alert list current.
//!
//! Each poll cycle reads the latest observer position, fetches the raw
//! alert set through an [`AlertFetcher`], ranks it with
//! [`alert_feed_ranking::rank`], and publishes the result. The timer
//! never starts a cycle while its previous one is still in flight, but a
//! manual refresh can overlap a timer cycle. To keep the published list
//! from regressing, every cycle takes a sequence number when it starts and
//! its result is applied only if no later cycle has been applied already.
//!
//! Transient fetch failures leave the previous result in place. An
//! authorization failure is fatal for the session: the poller stops itself
//! and reports [`PollerStatus::AuthRequired`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alert_feed_alert_models::RankedAlert;
use alert_feed_client::{AlertFetcher, FetchError};
use alert_feed_location::LatestLocation;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default time between poll cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Poller timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollerConfig {
    /// Milliseconds between timer-driven cycles.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Upper bound on a single fetch, in milliseconds. A fetch that takes
    /// longer counts as a transient failure.
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            fetch_timeout_ms: None,
        }
    }
}

impl PollerConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

/// Lifecycle state of a poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerStatus {
    /// No cycle has completed yet.
    Idle,
    /// The last completed cycle published fresh data.
    Live {
        /// Sequence number of the published cycle.
        seq: u64,
    },
    /// The last completed cycle failed transiently; the previous result is
    /// still being shown.
    Retrying {
        /// What went wrong.
        error: String,
    },
    /// The backend rejected the session. The poller has stopped.
    AuthRequired,
    /// [`AlertPoller::stop`] was called.
    Stopped,
}

impl PollerStatus {
    /// Returns `true` once the poller will run no more cycles.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::AuthRequired | Self::Stopped)
    }
}

/// What a single cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The result was ranked and published.
    Published {
        /// Sequence number of this cycle.
        seq: u64,
        /// Number of alerts published.
        alerts: usize,
    },
    /// A newer cycle had already been published; this result was dropped.
    Superseded {
        /// Sequence number of this cycle.
        seq: u64,
    },
    /// The fetch failed transiently; nothing was published.
    Failed {
        /// Sequence number of this cycle.
        seq: u64,
        /// What went wrong.
        error: String,
    },
    /// The backend rejected the session; the poller has stopped.
    Unauthorized {
        /// Sequence number of this cycle.
        seq: u64,
    },
    /// The poller was stopped before or during this cycle.
    Stopped,
}

/// Callback invoked with every published ranking.
pub type ResultCallback = Box<dyn Fn(&[RankedAlert]) + Send + Sync>;

/// Shared, latest published ranking.
pub type RankedSnapshot = Option<Arc<[RankedAlert]>>;

struct PublishState {
    applied_seq: u64,
    alive: bool,
}

struct Shared {
    fetcher: Arc<dyn AlertFetcher>,
    location: LatestLocation,
    fetch_timeout: Option<Duration>,
    on_result: Option<ResultCallback>,
    next_seq: AtomicU64,
    publish: Mutex<PublishState>,
    results: watch::Sender<RankedSnapshot>,
    status: watch::Sender<PollerStatus>,
}

impl Shared {
    fn is_alive(&self) -> bool {
        self.publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .alive
    }

    /// Marks the poller dead. Returns `false` if it already was.
    fn halt(&self, status: PollerStatus) -> bool {
        let mut state = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.alive {
            return false;
        }
        state.alive = false;
        self.status.send_replace(status);
        true
    }

    async fn run_cycle(&self) -> CycleOutcome {
        if !self.is_alive() {
            return CycleOutcome::Stopped;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        // Position is sampled once, at the start of the cycle.
        let observer = self.location.get();

        log::debug!("Poll cycle {seq} starting (observer: {observer:?})");

        let fetched = match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.fetcher.fetch_alerts()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::InvalidResponse {
                    message: format!("fetch timed out after {limit:?}"),
                }),
            },
            None => self.fetcher.fetch_alerts().await,
        };

        let alerts = match fetched {
            Ok(alerts) => alerts,
            Err(FetchError::Unauthorized) => {
                if self.halt(PollerStatus::AuthRequired) {
                    log::warn!("Poll cycle {seq}: session rejected, stopping poller");
                }
                return CycleOutcome::Unauthorized { seq };
            }
            Err(e) => {
                log::warn!("Poll cycle {seq} failed, keeping previous alerts: {e}");
                let error = e.to_string();
                let state = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
                if !state.alive {
                    return CycleOutcome::Stopped;
                }
                // Don't let an old failure mask a newer success.
                if seq > state.applied_seq {
                    self.status.send_replace(PollerStatus::Retrying {
                        error: error.clone(),
                    });
                }
                drop(state);
                return CycleOutcome::Failed { seq, error };
            }
        };

        let ranked = alert_feed_ranking::rank(observer, &alerts);
        let count = ranked.len();

        let mut state = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.alive {
            log::debug!("Poll cycle {seq} finished after stop, discarding");
            return CycleOutcome::Stopped;
        }
        if seq <= state.applied_seq {
            log::debug!(
                "Poll cycle {seq} superseded by cycle {}, discarding",
                state.applied_seq
            );
            return CycleOutcome::Superseded { seq };
        }
        state.applied_seq = seq;

        // Published under the lock so results reach the callback in
        // sequence order and never after stop().
        if let Some(on_result) = &self.on_result {
            on_result(&ranked);
        }
        self.results.send_replace(Some(ranked.into()));
        self.status.send_replace(PollerStatus::Live { seq });
        drop(state);

        log::debug!("Poll cycle {seq} published {count} alerts");
        CycleOutcome::Published { seq, alerts: count }
    }
}

/// Fetch-rank-publish refresh loop.
///
/// Dropping the poller stops it.
pub struct AlertPoller {
    shared: Arc<Shared>,
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AlertPoller {
    /// Creates a poller without starting its timer.
    #[must_use]
    pub fn new(config: PollerConfig, fetcher: Arc<dyn AlertFetcher>, location: LatestLocation) -> Self {
        Self::build(config, fetcher, location, None)
    }

    /// Creates a poller that calls `on_result` with every published
    /// ranking, without starting its timer.
    ///
    /// `on_result` runs while the poller's publish lock is held, so it must
    /// not call back into [`AlertPoller::stop`].
    #[must_use]
    pub fn with_callback<F>(
        config: PollerConfig,
        fetcher: Arc<dyn AlertFetcher>,
        location: LatestLocation,
        on_result: F,
    ) -> Self
    where
        F: Fn(&[RankedAlert]) + Send + Sync + 'static,
    {
        Self::build(config, fetcher, location, Some(Box::new(on_result)))
    }

    /// Creates a poller and immediately starts it: one cycle runs right
    /// away, then one every `config.interval_ms`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start<F>(
        config: PollerConfig,
        fetcher: Arc<dyn AlertFetcher>,
        location: LatestLocation,
        on_result: F,
    ) -> Self
    where
        F: Fn(&[RankedAlert]) + Send + Sync + 'static,
    {
        let poller = Self::with_callback(config, fetcher, location, on_result);
        poller.start_timer();
        poller
    }

    fn build(
        config: PollerConfig,
        fetcher: Arc<dyn AlertFetcher>,
        location: LatestLocation,
        on_result: Option<ResultCallback>,
    ) -> Self {
        let shared = Shared {
            fetcher,
            location,
            fetch_timeout: config.fetch_timeout(),
            on_result,
            next_seq: AtomicU64::new(0),
            publish: Mutex::new(PublishState {
                applied_seq: 0,
                alive: true,
            }),
            results: watch::Sender::new(None),
            status: watch::Sender::new(PollerStatus::Idle),
        };

        Self {
            shared: Arc::new(shared),
            interval: config.interval(),
            timer: Mutex::new(None),
        }
    }

    /// Starts the timer: one cycle immediately, then one per interval.
    /// Does nothing if the timer is already running or the poller stopped.
    pub fn start_timer(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_some() || !self.shared.is_alive() {
            return;
        }

        let shared = self.shared.clone();
        let interval = self.interval.max(Duration::from_millis(1));

        log::info!("Starting alert poller (every {interval:?})");

        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A slow cycle pushes the next tick back instead of bunching
            // the missed ticks together.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !shared.is_alive() {
                    break;
                }
                if let CycleOutcome::Unauthorized { .. } | CycleOutcome::Stopped =
                    shared.run_cycle().await
                {
                    break;
                }
            }
            log::debug!("Alert poller timer exited");
        }));
    }

    /// Runs one cycle right now, independent of the timer schedule.
    pub async fn refresh_now(&self) -> CycleOutcome {
        self.shared.run_cycle().await
    }

    /// Spawns one cycle outside the timer cadence without resetting the
    /// timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger_manual_refresh(&self) -> JoinHandle<CycleOutcome> {
        let shared = self.shared.clone();
        tokio::spawn(async move { shared.run_cycle().await })
    }

    /// Cancels the timer and blocks any in-flight cycle from publishing.
    /// Safe to call any number of times.
    pub fn stop(&self) {
        if self.shared.halt(PollerStatus::Stopped) {
            log::info!("Alert poller stopped");
        }
        if let Some(timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            timer.abort();
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> PollerStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<PollerStatus> {
        self.shared.status.subscribe()
    }

    /// Most recently published ranking, if any.
    #[must_use]
    pub fn latest(&self) -> RankedSnapshot {
        self.shared.results.borrow().clone()
    }

    /// Receiver notified on every published ranking.
    #[must_use]
    pub fn subscribe_results(&self) -> watch::Receiver<RankedSnapshot> {
        self.shared.results.subscribe()
    }

    /// Position cell the poller reads at the start of each cycle.
    #[must_use]
    pub fn location(&self) -> &LatestLocation {
        &self.shared.location
    }
}

impl Drop for AlertPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
