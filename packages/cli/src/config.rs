//! Layered configuration for the `alert_feed` binary.
//!
//! Settings come from, in increasing priority:
//!
//! 1. Built-in defaults.
//! 2. A TOML file: `--config`, else `ALERT_FEED_CONFIG`, else
//!    `alert_feed.toml` in the working directory if it exists.
//! 3. Environment variables (`ALERT_FEED_API_URL`, `ALERT_FEED_TOKEN`,
//!    `ALERT_FEED_POLL_INTERVAL_MS`).
//! 4. Command-line flags, applied by the caller.
//!
//! Without a token from any of these, the one saved by `login` in the
//! session file is used.
//!
//! ```toml
//! token = "..."
//! ratings_path = "ratings.json"
//! session_path = "session"
//!
//! [api]
//! base_url = "https://alerts.example.org"
//! timeout_secs = 10
//!
//! [poller]
//! interval_ms = 8000
//!
//! [location]
//! fix_timeout_secs = 15
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use alert_feed_client::ApiConfig;
use alert_feed_location::DEFAULT_FIX_TIMEOUT;
use alert_feed_poller::PollerConfig;
use serde::Deserialize;
use thiserror::Error;

/// Config file read when no path is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "alert_feed.toml";

/// Ratings file used when `ratings_path` isn't set.
pub const DEFAULT_RATINGS_FILE: &str = "alert_feed_ratings.json";

/// Session token file used when `session_path` isn't set.
pub const DEFAULT_SESSION_FILE: &str = "alert_feed_session";

pub const ENV_API_URL: &str = "ALERT_FEED_API_URL";
pub const ENV_TOKEN: &str = "ALERT_FEED_TOKEN";
pub const ENV_POLL_INTERVAL_MS: &str = "ALERT_FEED_POLL_INTERVAL_MS";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file couldn't be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file isn't valid TOML or has the wrong shape.
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// An environment override couldn't be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Location acquisition settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LocationConfig {
    /// How long a one-shot fix may take, in seconds.
    #[serde(default = "default_fix_timeout_secs")]
    pub fix_timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            fix_timeout_secs: default_fix_timeout_secs(),
        }
    }
}

impl LocationConfig {
    #[must_use]
    pub const fn fix_timeout(&self) -> Duration {
        Duration::from_secs(self.fix_timeout_secs)
    }
}

const fn default_fix_timeout_secs() -> u64 {
    DEFAULT_FIX_TIMEOUT.as_secs()
}

/// Everything the binary needs to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub location: LocationConfig,
    /// Bearer token for the backend session.
    #[serde(default)]
    pub token: Option<String>,
    /// Where star ratings are stored.
    #[serde(default)]
    pub ratings_path: Option<PathBuf>,
    /// Where `login` saves the session token.
    #[serde(default)]
    pub session_path: Option<PathBuf>,
}

impl FeedConfig {
    /// Loads the config file (if any) and applies environment overrides.
    ///
    /// `explicit` is the path given by `--config`/`ALERT_FEED_CONFIG`; it
    /// must exist. Without it, `alert_feed.toml` is used only if present.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Read`] / [`ConfigError::Parse`] for a bad file.
    /// * [`ConfigError::InvalidEnv`] for an unparseable override.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)?
                } else {
                    log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        log::debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if the poll interval isn't a
    /// positive integer.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(ENV_API_URL) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(token) = var(ENV_TOKEN) {
            self.token = Some(token.trim().to_string());
        }
        if let Some(value) = var(ENV_POLL_INTERVAL_MS) {
            self.poller.interval_ms = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidEnv {
                    name: ENV_POLL_INTERVAL_MS,
                    value,
                })?;
        }

        Ok(())
    }

    #[must_use]
    pub fn ratings_path(&self) -> PathBuf {
        self.ratings_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RATINGS_FILE))
    }

    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.session_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE))
    }
}
