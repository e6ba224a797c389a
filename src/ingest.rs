//! Activity ingestion: remote activity summaries -> aggregated edges.
//!
//! Fetching activities and refreshing tokens happens outside this crate; the
//! caller hands over already-retrieved summaries. Each ride's encoded
//! polyline is decoded, split into segment observations, and merged into the
//! edge store with the ride's overall average speed.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteGraphError};
use crate::geo_utils::polyline_length;
use crate::popularity::{trace_average_speed, EdgeStore};
use crate::segments::extract_segments;
use crate::GpsPoint;

/// Summary of one recorded activity as delivered by the activity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Provider sport type, e.g. "Ride" or "Run"
    pub sport_type: String,
    /// Encoded (Google) polyline of the whole activity
    #[serde(default)]
    pub summary_polyline: Option<String>,
    /// Distance in meters as reported by the provider
    #[serde(default)]
    pub distance_m: f64,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time_s: u32,
}

/// Ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Sport types whose traces feed the route graph.
    /// Default: ["Ride"]
    pub sport_types: Vec<String>,

    /// Decimal precision of encoded polylines.
    /// Default: 5 (Google/Strava summary polylines)
    pub polyline_precision: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sport_types: vec!["Ride".to_string()],
            polyline_precision: 5,
        }
    }
}

impl IngestConfig {
    fn accepts(&self, sport_type: &str) -> bool {
        self.sport_types.iter().any(|s| s == sport_type)
    }
}

/// What happened to a single activity during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Not one of the configured sport types
    Skipped,
    /// Accepted, but no usable trace (missing polyline or < 2 points)
    NoGeometry,
    /// Accepted and merged; carries the number of observations
    Ingested(usize),
}

/// Totals for one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct IngestStats {
    /// Activities of an accepted sport type
    pub activities_ingested: u32,
    /// Activities ignored because of their sport type
    pub activities_skipped: u32,
    /// Accepted activities without a usable trace
    pub activities_without_trace: u32,
    /// Segment observations merged into the store
    pub observations_merged: u32,
}

impl IngestStats {
    fn record(&mut self, outcome: ActivityOutcome) {
        match outcome {
            ActivityOutcome::Skipped => self.activities_skipped += 1,
            ActivityOutcome::NoGeometry => {
                self.activities_ingested += 1;
                self.activities_without_trace += 1;
            }
            ActivityOutcome::Ingested(count) => {
                self.activities_ingested += 1;
                self.observations_merged += count as u32;
            }
        }
    }
}

/// Decode an encoded polyline into GPS points.
pub fn decode_polyline(activity_id: &str, encoded: &str, precision: u32) -> Result<Vec<GpsPoint>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let line = polyline::decode_polyline(encoded, precision).map_err(|e| {
        RouteGraphError::PolylineDecode {
            activity_id: activity_id.to_string(),
            message: e.to_string(),
        }
    })?;

    // LineString coords are (x, y) = (lng, lat)
    Ok(line.coords().map(|c| GpsPoint::new(c.y, c.x)).collect())
}

/// Merge one decoded trace into `store`. Returns the number of observations.
pub fn ingest_trace<S: EdgeStore + ?Sized>(
    store: &mut S,
    points: &[GpsPoint],
    avg_speed_mps: f64,
) -> Result<usize> {
    let observations = extract_segments(points);
    if observations.is_empty() {
        return Ok(0);
    }
    store.upsert_batch(&observations, avg_speed_mps)
}

/// Decode and merge a single activity.
pub fn ingest_activity<S: EdgeStore + ?Sized>(
    store: &mut S,
    activity: &ActivitySummary,
    config: &IngestConfig,
) -> Result<ActivityOutcome> {
    if !config.accepts(&activity.sport_type) {
        return Ok(ActivityOutcome::Skipped);
    }

    let Some(encoded) = activity.summary_polyline.as_deref() else {
        return Ok(ActivityOutcome::NoGeometry);
    };
    let points = decode_polyline(&activity.id, encoded, config.polyline_precision)?;
    if points.len() < 2 {
        return Ok(ActivityOutcome::NoGeometry);
    }

    // Providers occasionally omit distance on manual uploads
    let distance_m = if activity.distance_m > 0.0 {
        activity.distance_m
    } else {
        polyline_length(&points)
    };
    let avg_speed = trace_average_speed(distance_m, activity.moving_time_s as f64);

    let merged = ingest_trace(store, &points, avg_speed)?;
    debug!(
        "Activity {} merged {} observations ({} points, {:.1} m/s)",
        activity.id,
        merged,
        points.len(),
        avg_speed
    );
    Ok(ActivityOutcome::Ingested(merged))
}

/// Merge a batch of activities into `store`.
///
/// Stops at the first activity whose trace is malformed; activities merged
/// before it stay in the store.
pub fn ingest_activities<S: EdgeStore + ?Sized>(
    store: &mut S,
    activities: &[ActivitySummary],
    config: &IngestConfig,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for activity in activities {
        match ingest_activity(store, activity, config) {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                warn!("Ingestion stopped at activity {}: {}", activity.id, e);
                return Err(e);
            }
        }
    }

    info!(
        "Ingested {} activities ({} skipped, {} without trace), {} observations",
        stats.activities_ingested,
        stats.activities_skipped,
        stats.activities_without_trace,
        stats.observations_merged
    );
    Ok(stats)
}
