//! Segment extraction: ordered GPS trace -> directed candidate edges.
//!
//! Each consecutive pair of points becomes one observation keyed by the
//! quantized start and end nodes. Pairs that quantize to the same node
//! (stationary or jittering fixes) are dropped, so no observation is ever
//! zero-length.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, NodeKey};
use crate::GpsPoint;

/// One traversal of a directed segment between two quantized nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentObservation {
    pub start_key: NodeKey,
    pub end_key: NodeKey,
    /// Geodesic distance between the raw (unquantized) points, in meters
    pub distance_m: f64,
}

/// Convert a decoded ride trace into directed edge observations in traversal
/// order.
///
/// Traces with fewer than 2 points produce an empty result. Points that fail
/// [`GpsPoint::is_valid`] are skipped together with both pairs they touch.
///
/// # Example
/// ```
/// use popular_routes::{GpsPoint, extract_segments};
///
/// let trace = vec![
///     GpsPoint::new(0.0, 0.0),
///     GpsPoint::new(0.0, 0.00001), // same node as the first point
///     GpsPoint::new(0.0, 0.01),
/// ];
/// let segments = extract_segments(&trace);
/// assert_eq!(segments.len(), 1);
/// assert_eq!(segments[0].end_key.as_str(), "0.0000:0.0100");
/// ```
pub fn extract_segments(points: &[GpsPoint]) -> Vec<SegmentObservation> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut segments = Vec::with_capacity(points.len() - 1);
    let mut skipped_invalid = 0usize;

    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if !a.is_valid() || !b.is_valid() {
            skipped_invalid += 1;
            continue;
        }

        let start_key = NodeKey::from_point(a);
        let end_key = NodeKey::from_point(b);
        if start_key == end_key {
            continue;
        }

        segments.push(SegmentObservation {
            start_key,
            end_key,
            distance_m: haversine_distance(a, b),
        });
    }

    if skipped_invalid > 0 {
        debug!(
            "Skipped {} segment pairs with invalid coordinates ({} points)",
            skipped_invalid,
            points.len()
        );
    }

    segments
}

/// Extract observations for many traces at once, one result per trace in
/// input order.
#[cfg(feature = "parallel")]
pub fn extract_segments_batch(traces: &[Vec<GpsPoint>]) -> Vec<Vec<SegmentObservation>> {
    use rayon::prelude::*;

    traces
        .par_iter()
        .map(|trace| extract_segments(trace))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_traces_are_empty() {
        assert!(extract_segments(&[]).is_empty());
        assert!(extract_segments(&[GpsPoint::new(46.5, 6.6)]).is_empty());
    }

    #[test]
    fn test_one_edge_per_pair() {
        let trace: Vec<GpsPoint> = (0..5)
            .map(|i| GpsPoint::new(46.5, 6.6 + i as f64 * 0.001))
            .collect();
        let segments = extract_segments(&trace);

        assert_eq!(segments.len(), 4);
        for (seg, pair) in segments.iter().zip(trace.windows(2)) {
            assert_eq!(seg.start_key, NodeKey::from_point(&pair[0]));
            assert_eq!(seg.end_key, NodeKey::from_point(&pair[1]));
            assert!((seg.distance_m - haversine_distance(&pair[0], &pair[1])).abs() < 1e-9);
        }
        // Traversal order is preserved: each edge starts where the last ended
        for w in segments.windows(2) {
            assert_eq!(w[0].end_key, w[1].start_key);
        }
    }

    #[test]
    fn test_duplicate_quantized_points_dropped() {
        let trace = vec![
            GpsPoint::new(10.0, 10.0),
            GpsPoint::new(10.00001, 10.00001),
            GpsPoint::new(10.00002, 9.99998),
            GpsPoint::new(10.001, 10.0),
        ];
        let segments = extract_segments(&trace);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_key.as_str(), "10.0000:10.0000");
        assert_eq!(segments[0].end_key.as_str(), "10.0010:10.0000");
        assert!(segments.iter().all(|s| s.start_key != s.end_key));
    }

    #[test]
    fn test_invalid_points_skipped() {
        let trace = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(f64::NAN, 0.0),
            GpsPoint::new(0.0, 0.01),
            GpsPoint::new(0.0, 0.02),
        ];
        let segments = extract_segments(&trace);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_key.as_str(), "0.0000:0.0100");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_batch_matches_sequential() {
        let traces: Vec<Vec<GpsPoint>> = (0..4)
            .map(|t| {
                (0..10)
                    .map(|i| GpsPoint::new(45.0 + t as f64 * 0.1, 7.0 + i as f64 * 0.001))
                    .collect()
            })
            .collect();
        let batch = extract_segments_batch(&traces);
        assert_eq!(batch.len(), traces.len());
        for (result, trace) in batch.iter().zip(&traces) {
            assert_eq!(result, &extract_segments(trace));
        }
    }
}
