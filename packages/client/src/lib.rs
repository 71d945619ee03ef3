#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! REST client for the alert backend.
//!
//! The backend owns authentication, persistence, and push delivery; this
//! crate only talks to its HTTP endpoints:
//!
//! * `GET /api/alerts` through the [`AlertFetcher`] trait, implemented by
//!   [`http::HttpAlertClient`].
//! * `POST /api/alerts` for reporting a new alert ([`submit`]).
//! * `POST /api/auth/login` and `/api/auth/signup` ([`auth`]).
//! * `GET /api/users/me` and the other account settings endpoints
//!   ([`users`]).
//!
//! The bearer token lives in an explicit [`Session`] handed to the client
//! rather than in ambient global state. A 401/403 from any endpoint clears
//! the session and surfaces as [`FetchError::Unauthorized`].

pub mod auth;
pub mod http;
pub mod submit;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use alert_feed_alert_models::AlertRecord;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use http::HttpAlertClient;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from talking to the backend.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (connection refused, DNS,
    /// timeout, interrupted body).
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// A response arrived but wasn't usable (bad status, bad JSON).
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what was wrong with the response.
        message: String,
    },

    /// The backend rejected the credentials, or there were none. The
    /// session must log in again.
    #[error("Not authorized; please log in again")]
    Unauthorized,
}

impl FetchError {
    /// Returns `true` for errors worth retrying on the next cycle.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Unauthorized)
    }
}

/// Source of the current alert set.
///
/// The poller only depends on this trait, so tests and alternative
/// backends can substitute their own implementation.
#[async_trait]
pub trait AlertFetcher: Send + Sync {
    /// Fetches every alert currently visible to the session.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unauthorized`] if the session must log in
    /// again, and a transient [`FetchError`] for anything else.
    async fn fetch_alerts(&self) -> Result<Vec<AlertRecord>, FetchError>;
}

/// Authentication context: owns the bearer token for one user session.
///
/// Cloning shares the same token, so clearing it after a 401 is visible
/// to every holder.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
}

impl Session {
    /// A session with no token.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session holding `token`. Blank tokens count as no token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::default();
        session.set_token(token);
        session
    }

    /// Current bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stores a new token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let token = (!token.trim().is_empty()).then_some(token);
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Forgets the token; the user has to log in again.
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL, without the `/api` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Joins `path` (e.g. `"/api/alerts"`) onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}
