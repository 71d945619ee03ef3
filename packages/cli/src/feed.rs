//! The live `feed` command.

use std::error::Error;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use alert_feed_alert_models::RankedAlert;
use alert_feed_client::users::UserProfile;
use alert_feed_location::{LatestLocation, LocationWatcher};
use alert_feed_poller::{AlertPoller, PollerConfig, PollerStatus};
use thiserror::Error;

use crate::config::FeedConfig;
use crate::ratings::RatingStore;
use crate::{LocationArgs, client, render};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The backend rejected the session, or there was none.
    #[error("Session missing or expired; run `alert_feed login` first")]
    SessionExpired,
}

/// Milliseconds between refreshes: `--interval-ms` if given, else the
/// account's refresh interval, else the configured one.
#[must_use]
pub fn interval_ms(flag: Option<u64>, account: Option<&UserProfile>, config: &PollerConfig) -> u64 {
    flag.or_else(|| {
        account
            .and_then(|profile| profile.preferences.app_prefs.refresh_interval())
            .map(|interval| u64::try_from(interval.as_millis()).unwrap_or(u64::MAX))
    })
    .unwrap_or(config.interval_ms)
}

/// Text printed for one published ranking.
///
/// Ratings are reread from `ratings_path` on every call.
#[must_use]
pub fn render_update(
    ranked: &[RankedAlert],
    location: Option<&LatestLocation>,
    ratings_path: &Path,
) -> String {
    let ratings = match RatingStore::open(ratings_path) {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("Showing feed without ratings: {e}");
            None
        }
    };

    let header = location.map_or_else(
        || "📍 No location source; alerts are unsorted".to_string(),
        |location| format!("📍 {}", location.status()),
    );

    format!("\n{header}\n{}", render::feed(ranked, ratings.as_ref()))
}

/// Reports poller status on stderr until `shutdown` resolves or the
/// poller stops.
///
/// The status current at the time of the call is handled before waiting
/// for changes, so a poller that already gave up is noticed immediately.
///
/// # Errors
///
/// Returns [`FeedError::SessionExpired`] once the poller reports
/// [`PollerStatus::AuthRequired`].
pub async fn follow_status<F>(poller: &AlertPoller, shutdown: F) -> Result<(), FeedError>
where
    F: Future<Output = ()>,
{
    let mut status = poller.subscribe_status();
    tokio::pin!(shutdown);

    loop {
        let current = status.borrow_and_update().clone();
        match current {
            PollerStatus::Retrying { error } => {
                eprintln!("Refresh failed, showing previous alerts: {error}");
            }
            PollerStatus::AuthRequired => return Err(FeedError::SessionExpired),
            PollerStatus::Stopped => return Ok(()),
            PollerStatus::Idle | PollerStatus::Live { .. } => {}
        }

        tokio::select! {
            () = &mut shutdown => return Ok(()),
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Runs the feed until Ctrl-C or until the session is rejected.
pub async fn run(
    config: &FeedConfig,
    location: &LocationArgs,
    interval_flag: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let latest = LatestLocation::new();
    let source = location.source()?;
    let _watch = source
        .as_deref()
        .map(|source| LocationWatcher::track(source, &latest));

    let client = client(config)?;

    let account = if interval_flag.is_none() && client.session().is_authenticated() {
        match client.fetch_profile().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                log::debug!("Using configured refresh interval: {e}");
                None
            }
        }
    } else {
        None
    };
    let poller_config = PollerConfig {
        interval_ms: interval_ms(interval_flag, account.as_ref(), &config.poller),
        ..config.poller
    };
    log::info!("Refreshing every {} ms", poller_config.interval_ms);

    let ratings_path = config.ratings_path();
    let shown_location = source.is_some().then(|| latest.clone());

    let poller = AlertPoller::start(poller_config, Arc::new(client), latest, move |ranked| {
        println!("{}", render_update(ranked, shown_location.as_ref(), &ratings_path));
    });

    let result = follow_status(&poller, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Can't listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;

    poller.stop();
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use alert_feed_alert_models::AlertRecord;
    use alert_feed_client::{ApiConfig, HttpAlertClient, Session};

    use super::*;

    fn anonymous_poller() -> AlertPoller {
        let client = HttpAlertClient::new(ApiConfig::default(), Session::anonymous()).unwrap();
        AlertPoller::new(PollerConfig::default(), Arc::new(client), LatestLocation::new())
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("alert_feed_feed_{name}_{}.json", std::process::id()))
    }

    #[tokio::test]
    async fn rejected_session_ends_the_feed_even_if_already_reported() {
        let client = HttpAlertClient::new(ApiConfig::default(), Session::anonymous()).unwrap();
        let poller = AlertPoller::start(
            PollerConfig::default(),
            Arc::new(client),
            LatestLocation::new(),
            |_| {},
        );

        tokio::time::timeout(Duration::from_secs(2), async {
            while poller.status() != PollerStatus::AuthRequired {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            follow_status(&poller, std::future::pending::<()>()),
        )
        .await
        .expect("feed loop should end on its own");
        assert_eq!(result, Err(FeedError::SessionExpired));
    }

    #[tokio::test]
    async fn stopped_poller_ends_the_feed() {
        let poller = anonymous_poller();
        poller.stop();

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            follow_status(&poller, std::future::pending::<()>()),
        )
        .await
        .unwrap();
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn shutdown_ends_the_feed() {
        let poller = anonymous_poller();
        assert_eq!(follow_status(&poller, async {}).await, Ok(()));
        assert_eq!(poller.status(), PollerStatus::Idle);
    }

    #[test]
    fn interval_precedence() {
        let config = PollerConfig {
            interval_ms: 8000,
            fetch_timeout_ms: None,
        };
        let mut profile = UserProfile::default();
        profile.preferences.app_prefs.refresh_interval = 30;

        assert_eq!(interval_ms(Some(2500), Some(&profile), &config), 2500);
        assert_eq!(interval_ms(None, Some(&profile), &config), 30_000);
        assert_eq!(interval_ms(None, None, &config), 8000);

        profile.preferences.app_prefs.refresh_interval = 0;
        assert_eq!(interval_ms(None, Some(&profile), &config), 8000);
    }

    #[test]
    fn ratings_are_reread_for_each_update() {
        let path = temp_path("reread");
        std::fs::remove_file(&path).ok();
        let ranked = vec![RankedAlert::unannotated(AlertRecord {
            id: "a1".to_string(),
            alert_type: "Fire".to_string(),
            additional_info: None,
            location: None,
            image_url: None,
            created_at: None,
        })];

        let before = render_update(&ranked, None, &path);
        RatingStore::open(&path).unwrap().rate("a1", 3).unwrap();
        let after = render_update(&ranked, None, &path);
        std::fs::remove_file(&path).ok();

        assert!(!before.contains('★'));
        assert!(after.contains("★★★☆☆"));
        assert!(after.starts_with("\n📍 No location source"));
    }
}
