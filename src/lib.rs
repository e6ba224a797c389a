//! # Popular Routes
//!
//! Popularity-weighted cycling route recommendation mined from recorded rides.
//!
//! This library provides:
//! - Coordinate quantization that collapses noisy GPS traces into a stable node space
//! - Incremental popularity/speed aggregation of observed road segments
//! - A Dijkstra search whose edge cost trades distance against popularity
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel processing with rayon
//! - **`persistence`** - Enable the SQLite-backed edge store
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use popular_routes::{GpsPoint, RouteEngine};
//!
//! let mut engine = RouteEngine::new();
//!
//! let ride: Vec<GpsPoint> = (0..=20)
//!     .map(|i| GpsPoint::new(46.5, 6.6 + i as f64 * 0.001))
//!     .collect();
//! engine.ingest_points(&ride, 6.5).unwrap();
//!
//! let route = engine
//!     .recommend(GpsPoint::new(46.5, 6.6), GpsPoint::new(46.5, 6.62), 10.0)
//!     .unwrap()
//!     .expect("route exists");
//! assert_eq!(route.path.len(), 21);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, RouteGraphError};

// Geographic utilities (distance, quantization)
pub mod geo_utils;
pub use geo_utils::{haversine_distance, key_to_coordinate, node_key, NodeKey};

// Trace -> candidate edge extraction
pub mod segments;
#[cfg(feature = "parallel")]
pub use segments::extract_segments_batch;
pub use segments::{extract_segments, SegmentObservation};

// Edge store and popularity aggregation
pub mod popularity;
pub use popularity::{trace_average_speed, upsert_edge, EdgeStore, MemoryEdgeStore, SegmentEdge};

// Bidirectional search graph and nearest-node resolution
pub mod graph;
pub use graph::{build_graph, nearest_node, Neighbor, RouteGraph};

// Popularity-weighted pathfinding
pub mod routing;
pub use routing::{edge_cost, find_route, recommend, RouteRecommendation};

// Activity summaries -> aggregated edges
pub mod ingest;
pub use ingest::{decode_polyline, ActivityOutcome, ActivitySummary, IngestConfig, IngestStats};

// Stateful engine (singleton with the shared edge store)
pub mod engine;
pub use engine::{with_engine, EngineStats, RouteEngine, ENGINE};

// SQLite edge store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteEdgeStore;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PopularRoutesRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use popular_routes::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Fail with `InvalidCoordinates` unless [`GpsPoint::is_valid`].
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RouteGraphError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Tuning for the popularity-weighted search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct RouteConfig {
    /// Popularity counts above this earn no additional bonus.
    /// Default: 20
    pub popularity_cap: u32,

    /// Cost discount per unit of (capped) popularity.
    /// Default: 0.04 (max bonus 0.8 at the cap)
    pub popularity_weight: f64,

    /// Floor for every edge cost; keeps the search free of zero-cost cycles.
    /// Default: 0.02
    pub min_edge_cost: f64,

    /// Lower bound for the distance normalizer, in meters.
    /// Default: 1000.0
    pub min_target_m: f64,

    /// Target ride length used when the caller does not supply one.
    /// Default: 30.0 km
    pub default_target_km: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            popularity_cap: 20,
            popularity_weight: 0.04,
            min_edge_cost: 0.02,
            min_target_m: 1000.0,
            default_target_km: 30.0,
        }
    }
}

impl RouteConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RouteConfig =
            serde_json::from_str(json).map_err(|e| RouteGraphError::Config {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break the search.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_edge_cost.is_finite() && self.min_edge_cost > 0.0) {
            return Err(RouteGraphError::Config {
                message: format!("min_edge_cost must be positive, got {}", self.min_edge_cost),
            });
        }
        if !(self.min_target_m.is_finite() && self.min_target_m > 0.0) {
            return Err(RouteGraphError::Config {
                message: format!("min_target_m must be positive, got {}", self.min_target_m),
            });
        }
        if !(self.popularity_weight.is_finite() && self.popularity_weight >= 0.0) {
            return Err(RouteGraphError::Config {
                message: format!(
                    "popularity_weight must be non-negative, got {}",
                    self.popularity_weight
                ),
            });
        }
        if !(self.default_target_km.is_finite() && self.default_target_km > 0.0) {
            return Err(RouteGraphError::Config {
                message: format!(
                    "default_target_km must be positive, got {}",
                    self.default_target_km
                ),
            });
        }
        Ok(())
    }

    /// Distance normalizer for a requested ride length.
    pub fn distance_scale_m(&self, target_km: f64) -> f64 {
        (target_km * 1000.0).max(self.min_target_m)
    }
}

// ============================================================================
// Tests
// ============================================================================
