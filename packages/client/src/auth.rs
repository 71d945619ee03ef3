//! Login and signup against `/api/auth/*`.
//!
//! On success the returned token is stored in the client's [`Session`].
//!
//! [`Session`]: crate::Session

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{backend_message, preview};
use crate::{FetchError, HttpAlertClient};

/// Fallback shown when the backend refuses credentials without a message.
const DEFAULT_REJECTION: &str = "Authentication failed";

/// Phone/password credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// Phone number in international format (`+237...`).
    pub phone: String,
    pub password: String,
    /// Country name; only meaningful for signup.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jurisdiction: String,
}

/// Which auth endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Signup,
}

impl AuthMode {
    const fn path(self) -> &'static str {
        match self {
            Self::Login => "/api/auth/login",
            Self::Signup => "/api/auth/signup",
        }
    }

    const fn success_message(self) -> &'static str {
        match self {
            Self::Login => "Login successful!",
            Self::Signup => "Signup successful!",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Errors from login or signup.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend refused the credentials.
    #[error("{message}")]
    Rejected {
        /// Message returned by the backend.
        message: String,
    },

    /// Transport failure or unusable response.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl HttpAlertClient {
    /// Logs in or signs up, storing any returned token in the session.
    ///
    /// Returns a confirmation message for display.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] with the backend's message when the
    /// credentials are refused, or [`AuthError::Fetch`] on transport or
    /// parse failures.
    pub async fn authenticate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<String, AuthError> {
        let url = self.config().endpoint(mode.path());
        log::debug!("POST {url}");

        let response = self
            .http()
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(FetchError::from)?;
        let data: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            log::warn!("POST {url} returned non-JSON body: {}", preview(&text));
            FetchError::InvalidResponse {
                message: format!("Server connection error ({e})"),
            }
        })?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                message: backend_message(&data).unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
            });
        }

        if let Some(token) = token_from(&data) {
            self.session().set_token(token);
            log::info!("Session authenticated");
        }

        Ok(mode.success_message().to_string())
    }
}

fn token_from(data: &serde_json::Value) -> Option<String> {
    serde_json::from_value::<AuthResponse>(data.clone())
        .ok()
        .and_then(|r| r.token)
        .filter(|t| !t.trim().is_empty())
}
