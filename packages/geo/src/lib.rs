#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spherical geometry for ranking alerts around an observer.
//!
//! Provides the [`Coordinate`] type shared by every alert-feed crate, the
//! haversine great-circle distance, the forward-azimuth initial bearing,
//! and the 16-point [`CompassPoint`] rose used to label bearings for
//! display. All functions are pure.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Width of one compass sector in degrees (360 / 16).
const SECTOR_DEGREES: f64 = 22.5;

/// A WGS-84 position in decimal degrees.
///
/// Latitude is expected in `[-90, 90]` and longitude in `[-180, 180]`.
/// Values outside those ranges are not rejected, but the distance and
/// bearing results for them are meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `true` if both components are finite numbers.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Returns `true` if the coordinate is finite and inside the valid
    /// latitude/longitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// One of the 16 points of the compass rose, clockwise from north.
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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CompassPoint {
    N,
    Nne,
    Ne,
    Ene,
    E,
    Ese,
    Se,
    Sse,
    S,
    Ssw,
    Sw,
    Wsw,
    W,
    Wnw,
    Nw,
    Nnw,
}

impl CompassPoint {
    /// Returns all 16 points in clockwise order starting at north.
    #[must_use]
    pub const fn all() -> &'static [Self; 16] {
        &[
            Self::N,
            Self::Nne,
            Self::Ne,
            Self::Ene,
            Self::E,
            Self::Ese,
            Self::Se,
            Self::Sse,
            Self::S,
            Self::Ssw,
            Self::Sw,
            Self::Wsw,
            Self::W,
            Self::Wnw,
            Self::Nw,
            Self::Nnw,
        ]
    }

    /// Maps a bearing in degrees to the nearest compass point.
    ///
    /// Sector boundaries sit at odd multiples of 11.25 degrees; a bearing
    /// exactly on a boundary rounds up to the next point clockwise. The
    /// index wraps modulo 16, so 360 degrees maps to [`CompassPoint::N`]
    /// like 0 degrees does. A non-finite bearing maps to north.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bearing(bearing_degrees: f64) -> Self {
        let sector = (bearing_degrees / SECTOR_DEGREES + 0.5).floor() as i64;
        Self::all()[usize::try_from(sector.rem_euclid(16)).unwrap_or(0)]
    }

    /// Center bearing of this sector in degrees.
    #[must_use]
    pub fn degrees(self) -> f64 {
        f64::from(self as u8) * SECTOR_DEGREES
    }
}

/// Great-circle distance between `a` and `b` in kilometers (haversine).
///
/// Symmetric, zero for identical points, and never larger than half the
/// Earth's circumference for valid inputs. Non-finite inputs yield `NaN`.
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points.
    let h = h.clamp(0.0, 1.0);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing (forward azimuth) from `a` towards `b`, in `[0, 360)`.
#[must_use]
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    let bearing = (y.atan2(x).to_degrees() + 360.0) % 360.0;
    if bearing >= 360.0 { 0.0 } else { bearing }
}

/// Compass label (e.g. `"NNE"`) for a bearing in degrees.
#[must_use]
pub fn to_compass_label(bearing_degrees: f64) -> &'static str {
    compass_label(CompassPoint::from_bearing(bearing_degrees))
}

const fn compass_label(point: CompassPoint) -> &'static str {
    match point {
        CompassPoint::N => "N",
        CompassPoint::Nne => "NNE",
        CompassPoint::Ne => "NE",
        CompassPoint::Ene => "ENE",
        CompassPoint::E => "E",
        CompassPoint::Ese => "ESE",
        CompassPoint::Se => "SE",
        CompassPoint::Sse => "SSE",
        CompassPoint::S => "S",
        CompassPoint::Ssw => "SSW",
        CompassPoint::Sw => "SW",
        CompassPoint::Wsw => "WSW",
        CompassPoint::W => "W",
        CompassPoint::Wnw => "WNW",
        CompassPoint::Nw => "NW",
        CompassPoint::Nnw => "NNW",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_CIRCUMFERENCE_KM: f64 = std::f64::consts::PI * EARTH_RADIUS_KM;

    fn sample_points() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(7.3697, 12.3547),
            Coordinate::new(41.8827, -87.6278),
            Coordinate::new(-33.8688, 151.2093),
            Coordinate::new(90.0, 0.0),
            Coordinate::new(-90.0, 180.0),
            Coordinate::new(0.0, -180.0),
            Coordinate::new(51.5074, -0.1278),
        ]
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let points = sample_points();
        for a in &points {
            assert!(distance_km(*a, *a).abs() < 1e-9, "{a} to itself");
            for b in &points {
                let ab = distance_km(*a, *b);
                let ba = distance_km(*b, *a);
                assert!((ab - ba).abs() < 1e-9, "{a} <-> {b}: {ab} vs {ba}");
            }
        }
    }

    #[test]
    fn distance_never_exceeds_half_circumference() {
        let points = sample_points();
        for a in &points {
            for b in &points {
                let d = distance_km(*a, *b);
                assert!(d >= 0.0);
                assert!(d <= HALF_CIRCUMFERENCE_KM + 1e-6, "{a} -> {b} = {d}");
            }
        }
        let antipodal = distance_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        assert!((antipodal - HALF_CIRCUMFERENCE_KM).abs() < 1e-6);
    }

    #[test]
    fn one_degree_east_of_origin() {
        let user = Coordinate::new(0.0, 0.0);
        let alert = Coordinate::new(0.0, 1.0);
        assert!((distance_km(user, alert) - 111.19).abs() < 0.5);
        assert!((bearing_degrees(user, alert) - 90.0).abs() < 1e-9);
        assert_eq!(to_compass_label(bearing_degrees(user, alert)), "E");
    }

    #[test]
    fn bearing_always_in_range() {
        let points = sample_points();
        for a in &points {
            for b in &points {
                let bearing = bearing_degrees(*a, *b);
                assert!((0.0..360.0).contains(&bearing), "{a} -> {b} = {bearing}");
            }
        }
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Coordinate::new(10.0, 10.0);
        assert!(bearing_degrees(origin, Coordinate::new(11.0, 10.0)).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(9.0, 10.0)) - 180.0).abs() < 1e-9);
        assert_eq!(to_compass_label(bearing_degrees(origin, Coordinate::new(10.0, 9.0))), "W");
    }

    #[test]
    fn compass_sector_boundaries() {
        assert_eq!(to_compass_label(0.0), "N");
        assert_eq!(to_compass_label(45.0), "NE");
        assert_eq!(to_compass_label(360.0), to_compass_label(0.0));
        assert_eq!(to_compass_label(11.249), "N");
        assert_eq!(to_compass_label(11.25), "NNE");
        assert_eq!(to_compass_label(348.75), "N");
        assert_eq!(to_compass_label(348.7), "NNW");
        assert_eq!(to_compass_label(180.0), "S");
        assert_eq!(to_compass_label(270.0), "W");
    }

    #[test]
    fn compass_labels_are_the_sixteen_points() {
        let labels: Vec<&str> = CompassPoint::all().iter().map(|p| compass_label(*p)).collect();
        assert_eq!(
            labels,
            [
                "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W",
                "WNW", "NW", "NNW"
            ]
        );
        for point in CompassPoint::all() {
            assert_eq!(point.to_string(), compass_label(*point));
            assert_eq!(point.as_ref().parse::<CompassPoint>().ok(), Some(*point));
            assert_eq!(CompassPoint::from_bearing(point.degrees()), *point);
        }

        let mut deg = 0.0;
        while deg < 720.0 {
            assert!(labels.contains(&to_compass_label(deg)));
            deg += 0.37;
        }
    }

    #[test]
    fn non_finite_distance_propagates_nan() {
        let bad = Coordinate::new(f64::NAN, 0.0);
        assert!(distance_km(Coordinate::new(0.0, 0.0), bad).is_nan());
        assert!(!bad.is_finite());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
    }
}
