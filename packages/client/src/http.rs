//! `reqwest`-backed [`AlertFetcher`] for `GET /api/alerts`.

use alert_feed_alert_models::AlertRecord;
use async_trait::async_trait;

use crate::{AlertFetcher, ApiConfig, FetchError, Session};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// HTTP client for the alert backend.
///
/// Cheap to clone; clones share the connection pool and the [`Session`].
#[derive(Debug, Clone)]
pub struct HttpAlertClient {
    client: reqwest::Client,
    config: ApiConfig,
    session: Session,
}

impl HttpAlertClient {
    /// Builds a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the TLS backend can't be
    /// initialised.
    pub fn new(config: ApiConfig, session: Session) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            config,
            session,
        })
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// The session token, or [`FetchError::Unauthorized`] when logged out.
    pub(crate) fn bearer(&self) -> Result<String, FetchError> {
        self.session.token().ok_or(FetchError::Unauthorized)
    }

    /// Maps 401/403 to [`FetchError::Unauthorized`] and drops the token.
    pub(crate) fn check_authorized(&self, status: reqwest::StatusCode) -> Result<(), FetchError> {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            log::warn!("Backend rejected session token (HTTP {status}), clearing session");
            self.session.clear();
            return Err(FetchError::Unauthorized);
        }
        Ok(())
    }

    /// Sends `request` with the session's bearer token and returns the
    /// status and raw body.
    ///
    /// A 401/403 is reported as [`FetchError::Unauthorized`] whatever the
    /// body contains, so proxies answering in plain text still end the
    /// session.
    pub(crate) async fn send_authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), FetchError> {
        let token = self.bearer()?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        self.check_authorized(status)?;

        let text = response.text().await?;
        Ok((status, text))
    }
}

#[async_trait]
impl AlertFetcher for HttpAlertClient {
    async fn fetch_alerts(&self) -> Result<Vec<AlertRecord>, FetchError> {
        let url = self.config.endpoint("/api/alerts");

        log::debug!("GET {url}");
        let (status, text) = self.send_authorized(self.client.get(&url)).await?;

        if !status.is_success() {
            log::warn!("GET {url} failed: HTTP {status}, body: {}", preview(&text));
            return Err(FetchError::InvalidResponse {
                message: format!("HTTP {status}"),
            });
        }

        parse_alerts(&text)
    }
}

/// Parses the `GET /api/alerts` body.
///
/// The body must be a JSON array. Individual entries that don't look like
/// alerts are logged and skipped so one bad record can't blank the feed.
///
/// # Errors
///
/// Returns [`FetchError::InvalidResponse`] if the body isn't a JSON array.
pub fn parse_alerts(body: &str) -> Result<Vec<AlertRecord>, FetchError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse {
            message: format!("JSON parse failed: {e} (body: {})", preview(body)),
        })?;

    let serde_json::Value::Array(items) = value else {
        return Err(FetchError::InvalidResponse {
            message: "alerts response is not an array".to_string(),
        });
    };

    let total = items.len();
    let alerts: Vec<AlertRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AlertRecord>(item) {
            Ok(alert) => Some(alert),
            Err(e) => {
                log::warn!("Skipping malformed alert record: {e}");
                None
            }
        })
        .collect();

    if alerts.len() < total {
        log::info!("Parsed {} of {total} alert records", alerts.len());
    }

    Ok(alerts)
}

/// Pulls the backend's `message` field out of a JSON body, if present.
pub(crate) fn backend_message(body: &serde_json::Value) -> Option<String> {
    body.get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

pub(crate) fn preview(text: &str) -> String {
    if text.chars().count() > BODY_PREVIEW_LEN {
        let head: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::respond_once;
    use alert_feed_geo::Coordinate;

    #[test]
    fn parses_alert_array() {
        let body = serde_json::json!([
            {
                "_id": "1",
                "type": "Fire",
                "additionalInfo": "Market stall on fire",
                "location": { "lat": 4.05, "lng": 9.7 },
                "createdAt": "2024-06-04T12:30:00Z"
            },
            { "_id": "2", "type": "Storm" }
        ])
        .to_string();

        let alerts = parse_alerts(&body).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].location, Some(Coordinate::new(4.05, 9.7)));
        assert_eq!(alerts[1].location, None);
    }

    #[test]
    fn skips_malformed_records() {
        let body = serde_json::json!([
            { "_id": "1", "type": "Fire" },
            { "type": "no id here" },
            42
        ])
        .to_string();

        let alerts = parse_alerts(&body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "1");
    }

    #[test]
    fn rejects_non_array_and_bad_json() {
        assert!(matches!(
            parse_alerts(r#"{"message":"oops"}"#),
            Err(FetchError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_alerts("<html>502 Bad Gateway</html>"),
            Err(FetchError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn extracts_backend_message() {
        assert_eq!(
            backend_message(&serde_json::json!({ "message": "Invalid phone" })).as_deref(),
            Some("Invalid phone")
        );
        assert_eq!(backend_message(&serde_json::json!({ "message": "" })), None);
        assert_eq!(backend_message(&serde_json::json!([])), None);
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let long = "x".repeat(BODY_PREVIEW_LEN + 10);
        assert_eq!(preview(&long).len(), BODY_PREVIEW_LEN + 3);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn fetches_with_bearer_token() {
        let (base_url, server) = respond_once(
            "200 OK",
            "application/json",
            r#"[{"_id":"1","type":"Fire","location":{"lat":"4.05","lng":"9.7"}}]"#,
        )
        .await;
        let config = ApiConfig {
            base_url,
            ..ApiConfig::default()
        };
        let client = HttpAlertClient::new(config, Session::with_token("t0k")).unwrap();

        let alerts = client.fetch_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].location, Some(Coordinate::new(4.05, 9.7)));

        let request = server.await.unwrap();
        assert!(request.head.starts_with("GET /api/alerts "));
        assert!(request.header("authorization").as_deref() == Some("Bearer t0k"));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (base_url, _server) =
            respond_once("502 Bad Gateway", "text/html", "<html>502</html>").await;
        let config = ApiConfig {
            base_url,
            ..ApiConfig::default()
        };
        let session = Session::with_token("t");
        let client = HttpAlertClient::new(config, session.clone()).unwrap();

        let err = client.fetch_alerts().await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse { .. }));
        assert!(err.is_transient());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn logged_out_session_is_unauthorized_without_a_request() {
        let client = HttpAlertClient::new(ApiConfig::default(), Session::anonymous()).unwrap();
        assert!(matches!(client.fetch_alerts().await, Err(FetchError::Unauthorized)));
    }

    #[test]
    fn forbidden_clears_session() {
        let session = Session::with_token("t");
        let client = HttpAlertClient::new(ApiConfig::default(), session.clone()).unwrap();
        assert!(client.check_authorized(reqwest::StatusCode::OK).is_ok());
        assert!(matches!(
            client.check_authorized(reqwest::StatusCode::FORBIDDEN),
            Err(FetchError::Unauthorized)
        ));
        assert!(!session.is_authenticated());
    }
}
