#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for the alert feed.
//!
//! `feed` keeps a proximity-ranked list of alerts on screen, refreshing it
//! on a timer and re-ranking against the latest known position. The other
//! commands cover the rest of the reporter workflow: one-shot ranking,
//! reporting an alert, logging in and out, account settings, and rating
//! alerts locally.

mod account;
mod config;
mod feed;
mod ratings;
mod render;
mod session;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use alert_feed_alert_models::AlertType;
use alert_feed_client::auth::{AuthMode, Credentials};
use alert_feed_client::submit::{AlertDraft, ImageAttachment};
use alert_feed_client::{AlertFetcher, FetchError, HttpAlertClient, Session};
use alert_feed_geo::Coordinate;
use alert_feed_location::source::{ReplayLocationSource, StaticLocationSource};
use alert_feed_location::{LocationSource, LocationStatus, acquire_fix};
use clap::{Args, Parser, Subcommand};

use crate::account::{PreferenceArgs, ProfileArgs};
use crate::config::FeedConfig;
use crate::ratings::RatingStore;

#[derive(Parser)]
#[command(name = "alert_feed", about = "Proximity-ranked community alert feed")]
struct Cli {
    /// Path to a TOML config file (default: `alert_feed.toml` if present)
    #[arg(long, global = true, env = "ALERT_FEED_CONFIG")]
    config: Option<PathBuf>,
    /// Backend base URL (overrides config and `ALERT_FEED_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Session token (overrides config, `ALERT_FEED_TOKEN` and the saved
    /// session)
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a live feed of alerts, nearest first, until interrupted
    Feed {
        #[command(flatten)]
        location: LocationArgs,
        /// Milliseconds between refreshes (default: the account's refresh
        /// interval, else config)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },
    /// Fetch and rank alerts once
    Rank {
        #[command(flatten)]
        location: LocationArgs,
        /// Print the ranked list as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Report a new alert at your current location
    Submit {
        /// Alert category (e.g. "Fire", "Medical Emergency"); see `types`
        #[arg(long = "type", value_parser = parse_alert_type)]
        alert_type: AlertType,
        /// Additional details for responders
        #[arg(long, default_value = "")]
        message: String,
        #[command(flatten)]
        location: LocationArgs,
        /// Photo to attach
        #[arg(long)]
        image: Option<PathBuf>,
        /// Confirm the photo doesn't expose anyone's identity needlessly
        #[arg(long)]
        accept_privacy: bool,
    },
    /// Log in and save the session token
    Login {
        /// Phone number in international format
        #[arg(long)]
        phone: String,
        #[arg(long, env = "ALERT_FEED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and save the session token
    Signup {
        /// Phone number in international format
        #[arg(long)]
        phone: String,
        #[arg(long, env = "ALERT_FEED_PASSWORD", hide_env_values = true)]
        password: String,
        /// Country the account reports from
        #[arg(long)]
        jurisdiction: String,
    },
    /// Rate an alert from 1 to 5 stars (stored locally)
    Rate {
        /// Alert id as shown in the feed
        alert_id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        stars: u8,
    },
    /// Forget the saved session token
    Logout,
    /// Show your profile, or change it with the given flags
    Profile(ProfileArgs),
    /// Show your preferences, or change them with the given flags
    Preferences(PreferenceArgs),
    /// Permanently delete your account
    DeleteAccount {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// List alert categories
    Types,
}

/// Where the observer's position comes from. With neither option, alerts
/// are shown unsorted and without distances.
#[derive(Debug, Args)]
struct LocationArgs {
    /// Observer latitude in degrees
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Observer longitude in degrees
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
    /// JSON-lines file of position readings to replay
    #[arg(long, conflicts_with_all = ["lat", "lng"])]
    location_file: Option<PathBuf>,
}

impl LocationArgs {
    fn source(&self) -> Result<Option<Box<dyn LocationSource>>, Box<dyn Error>> {
        if let (Some(lat), Some(lng)) = (self.lat, self.lng) {
            let coordinate = Coordinate::new(lat, lng);
            if !coordinate.is_valid() {
                return Err(format!("Invalid coordinate {coordinate}").into());
            }
            return Ok(Some(Box::new(StaticLocationSource::at(coordinate))));
        }

        Ok(self
            .location_file
            .as_ref()
            .map(|path| Box::new(ReplayLocationSource::new(path)) as Box<dyn LocationSource>))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut config = FeedConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    if let Some(token) = cli.token {
        config.token = Some(token);
    }
    if config.token.is_none() {
        config.token = session::load(&config.session_path())?;
    }

    match cli.command {
        Commands::Feed {
            location,
            interval_ms,
        } => feed::run(&config, &location, interval_ms).await?,
        Commands::Rank { location, json } => run_rank(&config, &location, json).await?,
        Commands::Submit {
            alert_type,
            message,
            location,
            image,
            accept_privacy,
        } => {
            let image = match image {
                Some(path) => Some(ImageAttachment::from_path(&path).await?),
                None => None,
            };
            let draft = AlertDraft {
                alert_type: Some(alert_type),
                message,
                location: locate(&location, config.location.fix_timeout()).await?,
                image,
                privacy_accepted: accept_privacy,
            };

            let receipt = client(&config)?.submit_alert(draft).await?;
            println!("{}", receipt.message.as_deref().unwrap_or("Alert sent"));
            if let Some(alert) = receipt.alert {
                println!("Alert id: {}", alert.id);
            }
        }
        Commands::Login { phone, password } => {
            let credentials = Credentials {
                phone,
                password,
                jurisdiction: String::new(),
            };
            authenticate(&config, AuthMode::Login, &credentials).await?;
        }
        Commands::Signup {
            phone,
            password,
            jurisdiction,
        } => {
            let credentials = Credentials {
                phone,
                password,
                jurisdiction,
            };
            authenticate(&config, AuthMode::Signup, &credentials).await?;
        }
        Commands::Logout => {
            let path = config.session_path();
            if session::remove(&path)? {
                println!("Logged out");
            } else {
                println!("No saved session at {}", path.display());
            }
            if std::env::var_os(config::ENV_TOKEN).is_some() {
                eprintln!("{} is still set in this shell", config::ENV_TOKEN);
            }
        }
        Commands::Profile(args) => account::profile(&client(&config)?, &args).await?,
        Commands::Preferences(args) => account::preferences(&client(&config)?, &args).await?,
        Commands::DeleteAccount { yes } => {
            account::delete(&client(&config)?, &config.session_path(), yes).await?;
        }
        Commands::Rate { alert_id, stars } => {
            let mut store = RatingStore::open(config.ratings_path())?;
            store.rate(&alert_id, stars)?;
            println!("Rated {alert_id} {}", ratings::stars(stars));
            log::debug!("Ratings saved to {}", store.path().display());
        }
        Commands::Types => {
            for alert_type in AlertType::all() {
                println!("{} {alert_type}", alert_type.icon());
            }
        }
    }

    Ok(())
}

fn parse_alert_type(label: &str) -> Result<AlertType, String> {
    AlertType::all()
        .iter()
        .find(|t| t.to_string().eq_ignore_ascii_case(label.trim()))
        .copied()
        .ok_or_else(|| format!("unknown alert type {label:?}; run `alert_feed types` for the list"))
}

fn client(config: &FeedConfig) -> Result<HttpAlertClient, FetchError> {
    let session = config
        .token
        .as_deref()
        .map_or_else(Session::anonymous, Session::with_token);
    HttpAlertClient::new(config.api.clone(), session)
}

/// Takes a single position reading, reporting progress on stderr.
/// A failed fix is reported and yields `None`.
async fn locate(
    args: &LocationArgs,
    timeout: Duration,
) -> Result<Option<Coordinate>, Box<dyn Error>> {
    let Some(source) = args.source()? else {
        return Ok(None);
    };

    eprintln!("📍 {}", LocationStatus::Detecting);
    match acquire_fix(source.as_ref(), timeout).await {
        Ok(fix) => {
            eprintln!(
                "📍 {}",
                LocationStatus::Captured {
                    accuracy_m: fix.accuracy_m
                }
            );
            Ok(Some(fix.coordinate))
        }
        Err(e) => {
            eprintln!("📍 {}: {}", e.status(), e.hint());
            Ok(None)
        }
    }
}

async fn run_rank(config: &FeedConfig, location: &LocationArgs, json: bool) -> Result<(), Box<dyn Error>> {
    let observer = locate(location, config.location.fix_timeout()).await?;
    let alerts = client(config)?.fetch_alerts().await?;
    let ranked = alert_feed_ranking::rank(observer, &alerts);

    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        let ratings = RatingStore::open(config.ratings_path())?;
        println!("{}", render::feed(&ranked, Some(&ratings)));
    }

    Ok(())
}

async fn authenticate(
    config: &FeedConfig,
    mode: AuthMode,
    credentials: &Credentials,
) -> Result<(), Box<dyn Error>> {
    let client = HttpAlertClient::new(config.api.clone(), Session::anonymous())?;
    let message = client.authenticate(mode, credentials).await?;
    println!("{message}");

    match client.session().token() {
        Some(token) => {
            let path = config.session_path();
            session::save(&path, &token)?;
            println!("Session saved to {}", path.display());
        }
        None => eprintln!("The backend did not return a session token"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_type_flag_is_case_insensitive() {
        assert_eq!(parse_alert_type("fire"), Ok(AlertType::Fire));
        assert_eq!(
            parse_alert_type(" medical emergency "),
            Ok(AlertType::MedicalEmergency)
        );
        assert!(parse_alert_type("Meteor").is_err());
    }

    #[test]
    fn location_flags() {
        let cli = Cli::parse_from(["alert_feed", "rank", "--lat", "-3.86", "--lng", "11.5"]);
        let Commands::Rank { location, .. } = cli.command else {
            panic!("expected rank");
        };
        assert!(location.source().unwrap().is_some());

        let none = LocationArgs {
            lat: None,
            lng: None,
            location_file: None,
        };
        assert!(none.source().unwrap().is_none());

        let out_of_range = LocationArgs {
            lat: Some(95.0),
            lng: Some(0.0),
            location_file: None,
        };
        assert!(out_of_range.source().is_err());
    }

    #[test]
    fn lat_requires_lng() {
        assert!(Cli::try_parse_from(["alert_feed", "rank", "--lat", "1.0"]).is_err());
    }

    #[test]
    fn account_commands() {
        let cli = Cli::parse_from([
            "alert_feed",
            "preferences",
            "--push",
            "false",
            "--refresh-interval",
            "30",
            "--default-type",
            "gas leak",
        ]);
        let Commands::Preferences(args) = cli.command else {
            panic!("expected preferences");
        };
        let mut prefs = alert_feed_client::users::Preferences::default();
        assert!(args.apply(&mut prefs));
        assert!(!prefs.alert_prefs.enable_push);
        assert_eq!(prefs.app_prefs.refresh_interval, 30);
        assert_eq!(prefs.alert_prefs.default_alert_type, "Gas Leak");

        assert!(Cli::try_parse_from(["alert_feed", "preferences", "--refresh-interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["alert_feed", "profile", "--jurisdiction", "Ghana"]).is_ok());
        assert!(Cli::try_parse_from(["alert_feed", "logout"]).is_ok());

        let cli = Cli::parse_from(["alert_feed", "delete-account"]);
        assert!(matches!(cli.command, Commands::DeleteAccount { yes: false }));
    }

    #[test]
    fn feed_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["alert_feed", "feed", "--interval-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["alert_feed", "feed", "--interval-ms", "500"]).is_ok());
    }

    #[test]
    fn rate_rejects_out_of_range_stars() {
        assert!(Cli::try_parse_from(["alert_feed", "rate", "abc", "6"]).is_err());
        assert!(Cli::try_parse_from(["alert_feed", "rate", "abc", "5"]).is_ok());
    }
}
