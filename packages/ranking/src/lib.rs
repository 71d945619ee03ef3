#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Proximity ranking of alerts around an observer.
//!
//! [`rank`] copies each alert, attaches its distance and compass bearing
//! from the observer when both positions are known, and orders the result
//! nearest first. Alerts that cannot be placed keep their input order at
//! the end of the list.
//!
//! A computed distance that is not finite (from `NaN` or infinite
//! coordinates) is treated the same as a missing location: the alert is
//! left unannotated rather than carrying a bogus distance.

use std::cmp::Ordering;

use alert_feed_alert_models::{AlertRecord, Proximity, RankedAlert};
use alert_feed_geo::{CompassPoint, Coordinate, bearing_degrees, distance_km};

/// Annotates `alerts` relative to `observer` and sorts them nearest first.
///
/// * With no observer every alert is returned unannotated, in input order.
/// * Annotated alerts come before unannotated ones.
/// * Ties (equal distances, or two unannotated alerts) keep input order.
///
/// Pure: inputs are not modified and identical inputs produce identical
/// output.
#[must_use]
pub fn rank(observer: Option<Coordinate>, alerts: &[AlertRecord]) -> Vec<RankedAlert> {
    let mut ranked: Vec<RankedAlert> = alerts
        .iter()
        .map(|alert| {
            let proximity = observer.zip(alert.location).and_then(|(from, to)| proximity(from, to));

            if proximity.is_none() && observer.is_some() && alert.location.is_some() {
                log::debug!(
                    "Alert {} has a non-finite distance, leaving it unranked",
                    alert.id
                );
            }

            RankedAlert {
                alert: alert.clone(),
                proximity,
            }
        })
        .collect();

    // `sort_by` is stable, which keeps input order within ties.
    ranked.sort_by(|a, b| compare_distance(a.distance_km(), b.distance_km()));

    ranked
}

/// Distance and compass bearing from `from` to `to`, or `None` if the
/// distance isn't a finite number.
#[must_use]
pub fn proximity(from: Coordinate, to: Coordinate) -> Option<Proximity> {
    let distance = distance_km(from, to);
    let bearing = CompassPoint::from_bearing(bearing_degrees(from, to));
    Proximity::new(distance, bearing)
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
