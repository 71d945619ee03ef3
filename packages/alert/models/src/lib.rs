#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Alert record types shared across the alert feed.
//!
//! [`AlertRecord`] mirrors the JSON objects served by `GET /api/alerts`.
//! [`RankedAlert`] is an alert decorated with its distance and compass
//! bearing from the observer; the two derived values live together in a
//! single [`Proximity`] so one can never be present without the other.
//! [`AlertType`] is the fixed category taxonomy users report under.

use alert_feed_geo::{CompassPoint, Coordinate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Category an emergency report is filed under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AlertType {
    Fire,
    Crime,
    #[serde(rename = "Medical Emergency")]
    #[strum(serialize = "Medical Emergency")]
    MedicalEmergency,
    Flood,
    Accident,
    Kidnapping,
    Explosion,
    #[serde(rename = "Building Collapse")]
    #[strum(serialize = "Building Collapse")]
    BuildingCollapse,
    #[serde(rename = "Road Block")]
    #[strum(serialize = "Road Block")]
    RoadBlock,
    Violence,
    #[serde(rename = "Gas Leak")]
    #[strum(serialize = "Gas Leak")]
    GasLeak,
    Storm,
    #[serde(rename = "Terror Attack")]
    #[strum(serialize = "Terror Attack")]
    TerrorAttack,
    #[serde(rename = "Armed Robbery")]
    #[strum(serialize = "Armed Robbery")]
    ArmedRobbery,
    #[serde(rename = "Missing Person")]
    #[strum(serialize = "Missing Person")]
    MissingPerson,
    #[serde(rename = "Animal Attack")]
    #[strum(serialize = "Animal Attack")]
    AnimalAttack,
    Earthquake,
    Landslide,
    #[serde(rename = "Civil Unrest")]
    #[strum(serialize = "Civil Unrest")]
    CivilUnrest,
    Other,
}

impl AlertType {
    /// Returns all variants in menu order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Fire,
            Self::Crime,
            Self::MedicalEmergency,
            Self::Flood,
            Self::Accident,
            Self::Kidnapping,
            Self::Explosion,
            Self::BuildingCollapse,
            Self::RoadBlock,
            Self::Violence,
            Self::GasLeak,
            Self::Storm,
            Self::TerrorAttack,
            Self::ArmedRobbery,
            Self::MissingPerson,
            Self::AnimalAttack,
            Self::Earthquake,
            Self::Landslide,
            Self::CivilUnrest,
            Self::Other,
        ]
    }

    /// Icon shown next to the category label.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Fire => "🔥",
            Self::Crime => "🚨",
            Self::MedicalEmergency => "🚑",
            Self::Flood => "🌊",
            Self::Accident => "🚗",
            Self::Kidnapping => "🧍‍♂️➡️🚐",
            Self::Explosion => "💥",
            Self::BuildingCollapse => "🏚️",
            Self::RoadBlock => "⛔",
            Self::Violence => "⚔️",
            Self::GasLeak => "🟡",
            Self::Storm => "🌩️",
            Self::TerrorAttack => "💣",
            Self::ArmedRobbery => "🔫",
            Self::MissingPerson => "🧒❓",
            Self::AnimalAttack => "🐍",
            Self::Earthquake => "🌍",
            Self::Landslide => "⛰️",
            Self::CivilUnrest => "🪧",
            Self::Other => "❓",
        }
    }
}

/// An alert as stored by the backend.
///
/// `alert_type` is kept as the raw label so alerts filed under a category
/// this build doesn't know about still flow through the feed; use
/// [`AlertRecord::category`] for the parsed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Opaque backend identifier.
    #[serde(alias = "_id")]
    pub id: String,
    /// Category label (see [`AlertType`]).
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Free-text details supplied by the reporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    /// Where the alert was reported. Missing or malformed locations
    /// deserialize to `None`.
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_location",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Coordinate>,
    /// Photo as a data URI or remote URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// When the alert was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    /// Parsed category, or `None` for labels outside the taxonomy.
    #[must_use]
    pub fn category(&self) -> Option<AlertType> {
        self.alert_type.parse().ok()
    }

    /// Reporter text, treating an empty string as absent.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        non_empty(self.additional_info.as_deref())
    }

    /// Photo reference, treating an empty string as absent.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        non_empty(self.image_url.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts `{ "lat": .., "lng": .. }` with numeric or numeric-string
/// components. Anything else (null, empty strings, missing keys) yields
/// `None` instead of failing the whole record.
fn deserialize_lenient_location<'de, D>(deserializer: D) -> Result<Option<Coordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coordinate_from_value))
}

/// Extracts a [`Coordinate`] from a loosely-typed JSON location object.
#[must_use]
pub fn coordinate_from_value(value: &serde_json::Value) -> Option<Coordinate> {
    let component = |key: &str| -> Option<f64> {
        match value.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    };

    Some(Coordinate::new(component("lat")?, component("lng")?))
}

/// Distance and direction from the observer to an alert.
///
/// Only constructed from finite distances, so a ranked alert either has
/// both values or neither.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proximity {
    distance_km: f64,
    bearing_label: CompassPoint,
}

impl Proximity {
    /// Returns `None` if `distance_km` is negative or not finite.
    #[must_use]
    pub fn new(distance_km: f64, bearing_label: CompassPoint) -> Option<Self> {
        (distance_km.is_finite() && distance_km >= 0.0).then_some(Self {
            distance_km,
            bearing_label,
        })
    }

    #[must_use]
    pub const fn distance_km(&self) -> f64 {
        self.distance_km
    }

    #[must_use]
    pub const fn bearing_label(&self) -> CompassPoint {
        self.bearing_label
    }
}

impl std::fmt::Display for Proximity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} km {}", self.distance_km, self.bearing_label)
    }
}

/// An alert annotated for display relative to the current observer.
///
/// Rebuilt from scratch on every refresh; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAlert {
    #[serde(flatten)]
    pub alert: AlertRecord,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub proximity: Option<Proximity>,
}

impl RankedAlert {
    #[must_use]
    pub const fn unannotated(alert: AlertRecord) -> Self {
        Self {
            alert,
            proximity: None,
        }
    }

    #[must_use]
    pub const fn annotated(alert: AlertRecord, proximity: Proximity) -> Self {
        Self {
            alert,
            proximity: Some(proximity),
        }
    }

    #[must_use]
    pub fn distance_km(&self) -> Option<f64> {
        self.proximity.map(|p| p.distance_km())
    }

    #[must_use]
    pub fn bearing_label(&self) -> Option<CompassPoint> {
        self.proximity.map(|p| p.bearing_label())
    }
}

/// Body of `POST /api/alerts`.
///
/// Empty `additional_info` and `image_url` are sent as empty strings,
/// which is what the backend expects for "not provided".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub additional_info: String,
    pub location: Coordinate,
    pub image_url: String,
}
