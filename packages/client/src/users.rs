//! Account settings (`/api/users/*`).
//!
//! * `GET /api/users/me` returns the [`UserProfile`] together with its
//!   [`Preferences`].
//! * `PUT /api/users/update` changes contact details ([`ProfileUpdate`]).
//! * `PUT /api/users/preferences` replaces all four preference groups.
//! * `DELETE /api/users/delete` removes the account and ends the session.
//!
//! Preference objects are read leniently: missing groups or fields take
//! their defaults, `null` counts as missing, and numbers may arrive as
//! strings (older clients saved form inputs verbatim).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::http::{backend_message, preview};
use crate::{FetchError, HttpAlertClient};

/// Seconds between feed refreshes for accounts that never changed it.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;

/// Radius, in kilometers, for accounts that never changed it.
pub const DEFAULT_NOTIFICATION_DISTANCE_KM: f64 = 10.0;

/// Hours an alert stays relevant for accounts that never changed it.
pub const DEFAULT_ALERT_EXPIRATION_HOURS: u32 = 48;

/// Errors from the account settings endpoints.
#[derive(Debug, Error)]
pub enum UserError {
    /// The backend refused the change.
    #[error("{message}")]
    Rejected {
        /// Backend message, or a generic fallback.
        message: String,
    },

    /// Transport or authorization failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// What to be alerted about and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertPrefs {
    /// Category preselected when reporting; empty for none.
    #[serde(deserialize_with = "nullable")]
    pub default_alert_type: String,
    /// Only notify about alerts within this many kilometers.
    #[serde(deserialize_with = "lenient_f64")]
    pub notification_distance: f64,
    #[serde(deserialize_with = "nullable")]
    pub enable_push: bool,
    #[serde(deserialize_with = "nullable")]
    pub enable_email: bool,
    /// Hours after which an alert is considered stale.
    #[serde(deserialize_with = "lenient_u32")]
    pub alert_expiration: u32,
}

impl Default for AlertPrefs {
    fn default() -> Self {
        Self {
            default_alert_type: String::new(),
            notification_distance: DEFAULT_NOTIFICATION_DISTANCE_KM,
            enable_push: true,
            enable_email: false,
            alert_expiration: DEFAULT_ALERT_EXPIRATION_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacyPrefs {
    #[serde(deserialize_with = "nullable")]
    pub share_location: bool,
    #[serde(deserialize_with = "nullable")]
    pub report_anonymous: bool,
}

impl Default for PrivacyPrefs {
    fn default() -> Self {
        Self {
            share_location: true,
            report_anonymous: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackPrefs {
    #[serde(deserialize_with = "nullable")]
    pub enable_replies: bool,
    #[serde(deserialize_with = "nullable")]
    pub notify_on_feedback: bool,
}

impl Default for FeedbackPrefs {
    fn default() -> Self {
        Self {
            enable_replies: true,
            notify_on_feedback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppPrefs {
    #[serde(deserialize_with = "nullable")]
    pub theme: String,
    #[serde(deserialize_with = "nullable")]
    pub language: String,
    /// Seconds between feed refreshes.
    #[serde(deserialize_with = "lenient_u64")]
    pub refresh_interval: u64,
}

impl Default for AppPrefs {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            language: "en".to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl AppPrefs {
    /// The refresh interval, or `None` if it is zero.
    #[must_use]
    pub const fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval))
        }
    }
}

/// The four preference groups, saved together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    #[serde(deserialize_with = "nullable")]
    pub alert_prefs: AlertPrefs,
    #[serde(deserialize_with = "nullable")]
    pub privacy_prefs: PrivacyPrefs,
    #[serde(deserialize_with = "nullable")]
    pub feedback_prefs: FeedbackPrefs,
    #[serde(deserialize_with = "nullable")]
    pub app_prefs: AppPrefs,
}

/// The signed-in user as returned by `GET /api/users/me`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    #[serde(alias = "_id", deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub phone: String,
    #[serde(deserialize_with = "nullable")]
    pub jurisdiction: String,
    #[serde(flatten)]
    pub preferences: Preferences,
}

/// Body of `PUT /api/users/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: String,
    pub jurisdiction: String,
    /// New password; left out when empty so the current one is kept.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl From<&UserProfile> for ProfileUpdate {
    fn from(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            jurisdiction: profile.jurisdiction.clone(),
            password: String::new(),
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A number, a numeric string, or `null`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got {s:?}"))),
        Some(other) => Err(serde::de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0)
        .unwrap_or(DEFAULT_NOTIFICATION_DISTANCE_KM))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map_or(DEFAULT_REFRESH_INTERVAL_SECS, |n| n.round() as u64))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map_or(DEFAULT_ALERT_EXPIRATION_HOURS, |n| n.round() as u32))
}

/// Parses the `GET /api/users/me` body.
///
/// # Errors
///
/// Returns [`FetchError::InvalidResponse`] if the body isn't a profile
/// object.
pub fn parse_profile(body: &str) -> Result<UserProfile, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse {
        message: format!("profile parse failed: {e} (body: {})", preview(body)),
    })
}

/// Turns a non-success status into [`UserError::Rejected`], preferring
/// the backend's own message.
fn confirm(
    status: reqwest::StatusCode,
    body: &str,
    success: &str,
    fallback: &str,
) -> Result<String, UserError> {
    if status.is_success() {
        return Ok(success.to_string());
    }

    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(backend_message)
        .unwrap_or_else(|| fallback.to_string());
    log::warn!("Backend refused account change (HTTP {status}): {message}");
    Err(UserError::Rejected { message })
}

impl HttpAlertClient {
    /// Fetches the signed-in user's profile and preferences.
    ///
    /// # Errors
    ///
    /// * [`FetchError::Unauthorized`] on 401/403 or when logged out.
    /// * [`FetchError::InvalidResponse`] for other failures or a bad body.
    pub async fn fetch_profile(&self) -> Result<UserProfile, FetchError> {
        let url = self.config().endpoint("/api/users/me");

        log::debug!("GET {url}");
        let (status, text) = self.send_authorized(self.http().get(&url)).await?;

        if !status.is_success() {
            log::warn!("GET {url} returned HTTP {status}: {}", preview(&text));
            return Err(FetchError::InvalidResponse {
                message: format!("Failed to fetch settings (HTTP {status})"),
            });
        }

        parse_profile(&text)
    }

    /// Saves name, phone, jurisdiction and optionally a new password.
    ///
    /// Returns the confirmation message.
    ///
    /// # Errors
    ///
    /// [`UserError::Rejected`] when the backend refuses the change, or
    /// [`UserError::Fetch`] for transport and authorization failures.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<String, UserError> {
        let url = self.config().endpoint("/api/users/update");

        log::info!("Updating profile for {}", update.phone);
        let (status, text) = self.send_authorized(self.http().put(&url).json(update)).await?;

        confirm(
            status,
            &text,
            "Profile updated successfully ✅",
            "Failed to update profile",
        )
    }

    /// Replaces all four preference groups.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_profile`].
    pub async fn save_preferences(&self, preferences: &Preferences) -> Result<String, UserError> {
        let url = self.config().endpoint("/api/users/preferences");

        log::debug!("PUT {url}");
        let (status, text) = self
            .send_authorized(self.http().put(&url).json(preferences))
            .await?;

        confirm(status, &text, "Preferences updated ✅", "Failed to save preferences")
    }

    /// Deletes the account. The session is cleared once the backend
    /// confirms.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_profile`].
    pub async fn delete_account(&self) -> Result<(), UserError> {
        let url = self.config().endpoint("/api/users/delete");

        log::info!("Deleting account");
        let (status, text) = self.send_authorized(self.http().delete(&url)).await?;

        confirm(status, &text, "Account deleted", "Failed to delete account")?;
        self.session().clear();
        Ok(())
    }
}
