//! `profile`, `preferences` and `delete-account`.

use std::error::Error;
use std::path::Path;

use alert_feed_alert_models::AlertType;
use alert_feed_client::HttpAlertClient;
use alert_feed_client::users::{Preferences, ProfileUpdate, UserProfile};
use clap::Args;

use crate::{parse_alert_type, render, session};

/// Contact details to change. With none given, the profile is shown.
#[derive(Debug, Default, Args)]
pub struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,
    /// Phone number in international format
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    jurisdiction: Option<String>,
    #[arg(long, env = "ALERT_FEED_NEW_PASSWORD", hide_env_values = true)]
    new_password: Option<String>,
}

impl ProfileArgs {
    const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.jurisdiction.is_none()
            && self.new_password.is_none()
    }

    /// `current` with the given fields replaced.
    fn apply(&self, current: &UserProfile) -> ProfileUpdate {
        let mut update = ProfileUpdate::from(current);
        set(&mut update.name, self.name.clone());
        set(&mut update.phone, self.phone.clone());
        set(&mut update.jurisdiction, self.jurisdiction.clone());
        set(&mut update.password, self.new_password.clone());
        update
    }
}

/// Preferences to change. With none given, the current ones are shown.
#[derive(Debug, Default, Args)]
pub struct PreferenceArgs {
    /// Category preselected when reporting
    #[arg(long, value_parser = parse_alert_type)]
    default_type: Option<AlertType>,
    /// Only notify about alerts within this many kilometers
    #[arg(long)]
    notification_distance: Option<f64>,
    /// Hours after which an alert is considered stale
    #[arg(long)]
    alert_expiration: Option<u32>,
    #[arg(long)]
    push: Option<bool>,
    #[arg(long)]
    email: Option<bool>,
    #[arg(long)]
    share_location: Option<bool>,
    #[arg(long)]
    report_anonymous: Option<bool>,
    #[arg(long)]
    replies: Option<bool>,
    #[arg(long)]
    notify_on_feedback: Option<bool>,
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    language: Option<String>,
    /// Seconds between feed refreshes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    refresh_interval: Option<u64>,
}

impl PreferenceArgs {
    /// Applies the given flags to `prefs`. Returns `false` if none were
    /// given.
    pub(crate) fn apply(&self, prefs: &mut Preferences) -> bool {
        let alerts = &mut prefs.alert_prefs;
        let privacy = &mut prefs.privacy_prefs;
        let feedback = &mut prefs.feedback_prefs;
        let app = &mut prefs.app_prefs;

        let changed = [
            set(
                &mut alerts.default_alert_type,
                self.default_type.map(|t| t.to_string()),
            ),
            set(&mut alerts.notification_distance, self.notification_distance),
            set(&mut alerts.alert_expiration, self.alert_expiration),
            set(&mut alerts.enable_push, self.push),
            set(&mut alerts.enable_email, self.email),
            set(&mut privacy.share_location, self.share_location),
            set(&mut privacy.report_anonymous, self.report_anonymous),
            set(&mut feedback.enable_replies, self.replies),
            set(&mut feedback.notify_on_feedback, self.notify_on_feedback),
            set(&mut app.theme, self.theme.clone()),
            set(&mut app.language, self.language.clone()),
            set(&mut app.refresh_interval, self.refresh_interval),
        ];

        changed.contains(&true)
    }
}

fn set<T>(slot: &mut T, value: Option<T>) -> bool {
    value.map(|value| *slot = value).is_some()
}

/// Shows the profile, or updates it when any field was given.
pub async fn profile(client: &HttpAlertClient, args: &ProfileArgs) -> Result<(), Box<dyn Error>> {
    let current = client.fetch_profile().await?;

    if args.is_empty() {
        println!("{}", render::profile(&current));
        return Ok(());
    }

    let message = client.update_profile(&args.apply(&current)).await?;
    println!("{message}");
    Ok(())
}

/// Shows the preferences, or saves them with the given changes.
pub async fn preferences(
    client: &HttpAlertClient,
    args: &PreferenceArgs,
) -> Result<(), Box<dyn Error>> {
    let mut prefs = client.fetch_profile().await?.preferences;

    if args.apply(&mut prefs) {
        let message = client.save_preferences(&prefs).await?;
        println!("{message}");
    }
    println!("{}", render::preferences(&prefs));
    Ok(())
}

/// Deletes the account and the saved session. Refuses unless `confirmed`.
pub async fn delete(
    client: &HttpAlertClient,
    session_path: &Path,
    confirmed: bool,
) -> Result<(), Box<dyn Error>> {
    if !confirmed {
        return Err("Deleting your account can't be undone; pass --yes to confirm".into());
    }

    client.delete_account().await?;
    session::remove(session_path)?;
    println!("Account deleted");
    Ok(())
}
