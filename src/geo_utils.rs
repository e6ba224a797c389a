//! # Geographic Utilities
//!
//! Geodesic distance and coordinate quantization for the route graph.
//!
//! ## Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`NodeKey`] | Quantized coordinate bucket used as a graph node |
//! | [`node_key`] / [`key_to_coordinate`] | Free-function forms of the key conversions |
//!
//! ## Example
//!
//! ```rust
//! use popular_routes::{GpsPoint, geo_utils};
//!
//! let a = GpsPoint::new(51.50741, -0.12779);
//! let key = geo_utils::node_key(a.latitude, a.longitude);
//! assert_eq!(key.as_str(), "51.5074:-0.1278");
//!
//! let back = key.to_coordinate().unwrap();
//! assert!(geo_utils::haversine_distance(&a, &back) < 10.0);
//! ```
//!
//! ## Quantization
//!
//! Latitude and longitude are rounded independently to [`NODE_PRECISION`]
//! decimal places (about 11 m at the equator, less for longitude at higher
//! latitudes). GPS fixes that differ only by sensor noise collapse into the
//! same key. The rounding is lossy and cannot be undone; decoding a key only
//! inverts the formatting step.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, RouteGraphError};
use crate::GpsPoint;

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Number of decimal places kept when quantizing a coordinate.
pub const NODE_PRECISION: usize = 4;

const NODE_SCALE: f64 = 10_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in meters between two GPS points (haversine).
///
/// Symmetric in its arguments, and exactly 0.0 for identical points.
///
/// ```rust
/// use popular_routes::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_500.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (p2.longitude - p1.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp guards asin against h drifting just above 1.0 for antipodal points
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Total length of a polyline (GPS track) in meters.
///
/// Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Quantization
// =============================================================================

/// Identifier of a quantized coordinate bucket, formatted as `"{lat}:{lon}"`
/// with exactly [`NODE_PRECISION`] fractional digits.
///
/// Ordering is lexicographic on the string form, which is what the
/// nearest-node resolver uses to break distance ties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Quantize a coordinate into its node key.
    pub fn from_coordinate(latitude: f64, longitude: f64) -> Self {
        NodeKey(format!(
            "{:.prec$}:{:.prec$}",
            quantize(latitude),
            quantize(longitude),
            prec = NODE_PRECISION
        ))
    }

    /// Quantize a GPS point into its node key.
    pub fn from_point(point: &GpsPoint) -> Self {
        Self::from_coordinate(point.latitude, point.longitude)
    }

    /// Parse and validate a key read from storage or a caller.
    pub fn parse(raw: &str) -> Result<Self> {
        let key = NodeKey(raw.to_string());
        key.to_coordinate()?;
        Ok(key)
    }

    /// Wrap a stored key without validating it. Decoding errors surface on
    /// first use of [`NodeKey::to_coordinate`].
    pub fn from_raw(raw: String) -> Self {
        NodeKey(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the key back into the (rounded) coordinate it represents.
    pub fn to_coordinate(&self) -> Result<GpsPoint> {
        let (lat, lon) = self
            .0
            .split_once(':')
            .ok_or_invalid_key(&self.0, "missing ':' separator")?;

        let latitude = parse_component(&self.0, lat, "latitude")?;
        let longitude = parse_component(&self.0, lon, "longitude")?;
        Ok(GpsPoint::new(latitude, longitude))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Round to [`NODE_PRECISION`] places, folding negative zero into zero so
/// that `-0.00001` and `0.00001` share a key.
fn quantize(value: f64) -> f64 {
    let rounded = (value * NODE_SCALE).round() / NODE_SCALE;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn parse_component(key: &str, part: &str, name: &str) -> Result<f64> {
    let value: f64 = part
        .trim()
        .parse()
        .map_err(|_| RouteGraphError::InvalidNodeKey {
            key: key.to_string(),
            message: format!("{} '{}' is not a number", name, part),
        })?;
    if !value.is_finite() {
        return Err(RouteGraphError::InvalidNodeKey {
            key: key.to_string(),
            message: format!("{} is not finite", name),
        });
    }
    Ok(value)
}

/// Quantize a coordinate into a node key.
pub fn node_key(latitude: f64, longitude: f64) -> NodeKey {
    NodeKey::from_coordinate(latitude, longitude)
}

/// Decode a raw key string into a coordinate.
pub fn key_to_coordinate(key: &str) -> Result<GpsPoint> {
    NodeKey::from_raw(key.to_string()).to_coordinate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_symmetric() {
        let a = GpsPoint::new(46.5197, 6.6323);
        let b = GpsPoint::new(46.2044, 6.1432);
        let ab = haversine_distance(&a, &b);
        let ba = haversine_distance(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 50_000.0 && ab < 52_000.0);
    }

    #[test]
    fn test_haversine_identical_points() {
        let a = GpsPoint::new(-33.8688, 151.2093);
        assert_eq!(haversine_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_one_hundredth_degree_at_equator() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0, 0.01);
        let d = haversine_distance(&a, &b);
        assert!((d - 1111.95).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GpsPoint::new(1.0, 1.0)]), 0.0);

        let track = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 0.01),
            GpsPoint::new(0.0, 0.02),
        ];
        let direct = haversine_distance(&track[0], &track[2]);
        assert!((polyline_length(&track) - direct).abs() < 1e-6);
    }

    #[test]
    fn test_node_key_format() {
        assert_eq!(node_key(0.0, 0.01).as_str(), "0.0000:0.0100");
        assert_eq!(node_key(51.50744, -0.12776).as_str(), "51.5074:-0.1278");
        assert_eq!(node_key(-0.00001, 0.00002).as_str(), "0.0000:0.0000");
    }

    #[test]
    fn test_noise_collapses_to_same_key() {
        assert_eq!(node_key(45.123_41, 7.654_32), node_key(45.123_44, 7.654_29));
        assert_ne!(node_key(45.1234, 7.6543), node_key(45.1236, 7.6543));
    }

    #[test]
    fn test_key_round_trip_within_precision() {
        let samples = [
            (51.507_351, -0.127_758),
            (-33.868_82, 151.209_29),
            (0.000_049, -179.999_96),
            (89.999_99, 12.345_65),
        ];
        for (lat, lon) in samples {
            let coord = node_key(lat, lon).to_coordinate().unwrap();
            assert!((coord.latitude - lat).abs() <= 0.000_05 + 1e-12);
            assert!((coord.longitude - lon).abs() <= 0.000_05 + 1e-12);
        }
    }

    #[test]
    fn test_key_to_coordinate_accepts_short_forms() {
        let p = key_to_coordinate("0.01:0.01").unwrap();
        assert_eq!(p, GpsPoint::new(0.01, 0.01));
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for raw in ["", "1.0", "abc:1.0", "1.0:xyz", "NaN:0", "1.0:inf"] {
            let err = key_to_coordinate(raw).unwrap_err();
            assert!(
                matches!(err, RouteGraphError::InvalidNodeKey { .. }),
                "{} should be rejected",
                raw
            );
        }
        assert!(NodeKey::parse("12.0000:13.0000").is_ok());
        assert!(NodeKey::parse("12.0000-13.0000").is_err());
    }
}
