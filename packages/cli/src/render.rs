//! Plain-text rendering of feed entries.

use alert_feed_alert_models::{AlertType, RankedAlert};
use alert_feed_client::users::{Preferences, UserProfile};

use crate::ratings::{RatingStore, stars};

/// Icon for labels outside the known taxonomy.
const UNKNOWN_ICON: &str = "⚠️";

/// One feed entry, e.g.
///
/// ```text
/// 🔥 Fire · 2.3 km NE · 2024-06-04 12:30 UTC · ★★★★☆  [665f1c...]
///     Market stall on fire
/// ```
#[must_use]
pub fn entry(ranked: &RankedAlert, rating: Option<u8>) -> String {
    let alert = &ranked.alert;
    let icon = alert.category().map_or(UNKNOWN_ICON, AlertType::icon);

    let mut line = format!("{icon} {}", alert.alert_type);
    if let Some(proximity) = &ranked.proximity {
        line.push_str(&format!(" · {proximity}"));
    }
    if let Some(created_at) = alert.created_at {
        line.push_str(&format!(" · {}", created_at.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(rating) = rating {
        line.push_str(&format!(" · {}", stars(rating)));
    }
    line.push_str(&format!("  [{}]", alert.id));

    if let Some(details) = alert.details() {
        line.push_str("\n    ");
        line.push_str(details);
    }
    if alert.image().is_some() {
        line.push_str("\n    (photo attached)");
    }

    line
}

/// Renders a whole ranking, one entry per block.
#[must_use]
pub fn feed(ranked: &[RankedAlert], ratings: Option<&RatingStore>) -> String {
    if ranked.is_empty() {
        return "No alerts yet.".to_string();
    }

    ranked
        .iter()
        .map(|r| entry(r, ratings.and_then(|store| store.get(&r.alert.id))))
        .collect::<Vec<_>>()
        .join("\n")
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn or_unset(value: &str) -> &str {
    if value.trim().is_empty() { "(not set)" } else { value }
}

/// Contact details followed by the account's preferences.
#[must_use]
pub fn profile(profile: &UserProfile) -> String {
    format!(
        "Name:          {}\nPhone:         {}\nJurisdiction:  {}\n\n{}",
        or_unset(&profile.name),
        or_unset(&profile.phone),
        or_unset(&profile.jurisdiction),
        preferences(&profile.preferences)
    )
}

/// One line per preference group.
#[must_use]
pub fn preferences(prefs: &Preferences) -> String {
    let alerts = &prefs.alert_prefs;
    let privacy = &prefs.privacy_prefs;
    let feedback = &prefs.feedback_prefs;
    let app = &prefs.app_prefs;

    let default_type = if alerts.default_alert_type.is_empty() {
        "none"
    } else {
        alerts.default_alert_type.as_str()
    };
    let refresh = app
        .refresh_interval()
        .map_or_else(|| "off".to_string(), |d| format!("every {} s", d.as_secs()));

    [
        format!(
            "Alerts:    default type {default_type} · within {} km · push {} · email {} · expire after {} h",
            alerts.notification_distance,
            on_off(alerts.enable_push),
            on_off(alerts.enable_email),
            alerts.alert_expiration,
        ),
        format!(
            "Privacy:   share location {} · report anonymously {}",
            on_off(privacy.share_location),
            on_off(privacy.report_anonymous),
        ),
        format!(
            "Feedback:  replies {} · notify on feedback {}",
            on_off(feedback.enable_replies),
            on_off(feedback.notify_on_feedback),
        ),
        format!(
            "App:       theme {} · language {} · refresh {refresh}",
            app.theme, app.language
        ),
    ]
    .join("\n")
}
