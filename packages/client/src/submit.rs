//! Reporting a new alert (`POST /api/alerts`).
//!
//! An [`AlertDraft`] collects what the reporter entered and is validated
//! locally before anything is sent: a category and a location are
//! required, and an attached photo requires the privacy notice to be
//! acknowledged.

use std::path::Path;

use alert_feed_alert_models::{AlertRecord, AlertType, NewAlert};
use alert_feed_geo::Coordinate;
use base64::Engine as _;
use thiserror::Error;

use crate::http::{backend_message, preview};
use crate::{FetchError, HttpAlertClient};

/// Fallback shown when the backend rejects a report without a message.
const DEFAULT_REJECTION: &str = "Failed To Create Alert";

/// Errors from reporting an alert.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No category was chosen.
    #[error("Select An Alert Type")]
    MissingType,

    /// No location was captured.
    #[error("Get Your Location First")]
    MissingLocation,

    /// A photo is attached but the privacy notice wasn't acknowledged.
    #[error("Please confirm the privacy notice before sending")]
    PrivacyNotAcknowledged,

    /// The photo couldn't be read.
    #[error("Failed to read image {path}: {source}")]
    Image {
        /// Path of the image file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backend refused the report.
    #[error("{message}")]
    Rejected {
        /// Message returned by the backend.
        message: String,
    },

    /// Transport or authorization failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A photo encoded for upload as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    data_uri: String,
}

impl ImageAttachment {
    /// Encodes raw image bytes with the given MIME type.
    #[must_use]
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self {
            data_uri: format!("data:{mime};base64,{encoded}"),
        }
    }

    /// Reads and encodes an image file, inferring the MIME type from its
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Image`] if the file can't be read.
    pub async fn from_path(path: &Path) -> Result<Self, SubmitError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| SubmitError::Image {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_bytes(mime_for(path), &bytes))
    }

    #[must_use]
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// What the reporter has filled in so far.
#[derive(Debug, Clone, Default)]
pub struct AlertDraft {
    pub alert_type: Option<AlertType>,
    pub message: String,
    pub location: Option<Coordinate>,
    pub image: Option<ImageAttachment>,
    pub privacy_accepted: bool,
}

impl AlertDraft {
    /// Validates the draft and turns it into a request body.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, checked in the order type,
    /// location, privacy acknowledgement.
    pub fn into_request(self) -> Result<NewAlert, SubmitError> {
        let alert_type = self.alert_type.ok_or(SubmitError::MissingType)?;
        let location = self
            .location
            .filter(Coordinate::is_finite)
            .ok_or(SubmitError::MissingLocation)?;

        if self.image.is_some() && !self.privacy_accepted {
            return Err(SubmitError::PrivacyNotAcknowledged);
        }

        Ok(NewAlert {
            alert_type,
            additional_info: self.message.trim().to_string(),
            location,
            image_url: self
                .image
                .map(|image| image.data_uri)
                .unwrap_or_default(),
        })
    }
}

/// The backend's answer to a successful report.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// Confirmation message, if the backend sent one.
    pub message: Option<String>,
    /// The stored alert, if the backend echoed it back.
    pub alert: Option<AlertRecord>,
}

impl HttpAlertClient {
    /// Validates `draft` and posts it to `POST /api/alerts`.
    ///
    /// # Errors
    ///
    /// * Validation errors before any request is made.
    /// * [`FetchError::Unauthorized`] (wrapped) on 401/403 or when logged out.
    /// * [`SubmitError::Rejected`] when the backend refuses the report.
    /// * [`FetchError::InvalidResponse`] (wrapped) if the body isn't JSON.
    pub async fn submit_alert(&self, draft: AlertDraft) -> Result<SubmitReceipt, SubmitError> {
        let body = draft.into_request()?;
        let url = self.config().endpoint("/api/alerts");

        log::info!("Reporting {} alert at {}", body.alert_type, body.location);

        let (status, text) = self.send_authorized(self.http().post(&url).json(&body)).await?;

        let data: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            log::warn!("POST {url} returned non-JSON body: {}", preview(&text));
            FetchError::InvalidResponse {
                message: format!("Server error: invalid response ({e})"),
            }
        })?;

        if !status.is_success() {
            return Err(SubmitError::Rejected {
                message: backend_message(&data).unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
            });
        }

        Ok(parse_receipt(&data))
    }
}

/// Accepts either the stored alert itself or `{ message, alert }`.
fn parse_receipt(data: &serde_json::Value) -> SubmitReceipt {
    let alert = data
        .get("alert")
        .unwrap_or(data)
        .clone();

    SubmitReceipt {
        message: backend_message(data),
        alert: serde_json::from_value(alert).ok(),
    }
}
