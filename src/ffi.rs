//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Thin UniFFI exports over the global [`ENGINE`](crate::ENGINE). Failures
//! are logged and mapped to empty values so the host never sees a panic.

use log::{info, warn};

use crate::engine::{with_engine, EngineStats};
use crate::ingest::{ActivitySummary, IngestStats};
use crate::{init_logging, GpsPoint, RouteConfig};

/// Initialize the engine (call once at app startup).
#[uniffi::export]
pub fn engine_init() {
    init_logging();
    info!("[PopularRoutes] Initialized");
}

/// Switch the global engine to the SQLite store at `db_path`.
#[cfg(feature = "persistence")]
#[uniffi::export]
pub fn engine_open_database(db_path: String) -> bool {
    match crate::RouteEngine::open(&db_path) {
        Ok(engine) => {
            with_engine(|e| *e = engine);
            true
        }
        Err(err) => {
            warn!("[PopularRoutes] Failed to open {}: {}", db_path, err);
            false
        }
    }
}

/// Clear all edges.
#[uniffi::export]
pub fn engine_clear() {
    if let Err(err) = with_engine(|e| e.clear()) {
        warn!("[PopularRoutes] Clear failed: {}", err);
    }
}

/// Ingest activity summaries given as a JSON array.
///
/// When `replace` is true the edge store is cleared first.
#[uniffi::export]
pub fn engine_ingest_activities_json(activities_json: String, replace: bool) -> Option<IngestStats> {
    let activities: Vec<ActivitySummary> = match serde_json::from_str(&activities_json) {
        Ok(a) => a,
        Err(err) => {
            warn!("[PopularRoutes] Invalid activities JSON: {}", err);
            return None;
        }
    };

    let result = with_engine(|e| {
        if replace {
            e.reingest_activities(&activities)
        } else {
            e.ingest_activities(&activities)
        }
    });
    result
        .map_err(|err| warn!("[PopularRoutes] Ingestion failed: {}", err))
        .ok()
}

/// Ingest one decoded trace from a flat `[lat, lng, lat, lng, ...]` buffer.
/// Returns the number of merged observations.
#[uniffi::export]
pub fn engine_ingest_points(flat_coords: Vec<f64>, avg_speed_mps: f64) -> u32 {
    let points: Vec<GpsPoint> = flat_coords
        .chunks_exact(2)
        .map(|c| GpsPoint::new(c[0], c[1]))
        .collect();

    match with_engine(|e| e.ingest_points(&points, avg_speed_mps)) {
        Ok(count) => count as u32,
        Err(err) => {
            warn!("[PopularRoutes] Trace ingestion failed: {}", err);
            0
        }
    }
}

/// Recommend a route; returns the recommendation as JSON, or `"null"` when
/// there is no route or the request failed.
#[uniffi::export]
pub fn engine_recommend(start: GpsPoint, end: GpsPoint, target_km: f64) -> String {
    match with_engine(|e| e.recommend_json(start, end, target_km)) {
        Ok(json) => json,
        Err(err) => {
            warn!("[PopularRoutes] Recommendation failed: {}", err);
            "null".to_string()
        }
    }
}

/// Replace the search configuration. Returns false if it was rejected.
#[uniffi::export]
pub fn engine_set_route_config(config: RouteConfig) -> bool {
    with_engine(|e| e.set_route_config(config))
        .map_err(|err| warn!("[PopularRoutes] Rejected config: {}", err))
        .is_ok()
}

/// Get engine statistics.
#[uniffi::export]
pub fn engine_get_stats() -> Option<EngineStats> {
    with_engine(|e| e.stats())
        .map_err(|err| warn!("[PopularRoutes] Stats failed: {}", err))
        .ok()
}

/// Decode an encoded polyline to flat coordinates `[lat, lng, lat, lng, ...]`.
#[uniffi::export]
pub fn decode_polyline_to_coordinates(encoded: String) -> Vec<f64> {
    crate::ingest::decode_polyline("ffi", &encoded, 5)
        .map(|points| {
            points
                .iter()
                .flat_map(|p| [p.latitude, p.longitude])
                .collect()
        })
        .unwrap_or_default()
}
