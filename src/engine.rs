//! # Route Engine
//!
//! Stateful façade over the shared edge store.
//!
//! ## Architecture
//!
//! The engine owns:
//! - One edge store shared by every rider (no per-athlete partition)
//! - The assembled search graph, cached until the next write
//! - Search and ingestion configuration
//!
//! Writes (ingestion) take `&mut self`; behind the global [`ENGINE`] mutex
//! that makes every ingestion batch a single writer. Queries reuse the
//! cached graph, so repeated recommendations do not reload the store.

use std::sync::Mutex;

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::graph::RouteGraph;
use crate::ingest::{self, ActivitySummary, IngestConfig, IngestStats};
use crate::popularity::{EdgeStore, MemoryEdgeStore, SegmentEdge};
use crate::routing::{self, RouteRecommendation};
use crate::{GpsPoint, RouteConfig};

// ============================================================================
// Route Engine
// ============================================================================

/// The main stateful route engine.
pub struct RouteEngine {
    store: Box<dyn EdgeStore + Send>,

    /// Search graph built from the current store contents; `None` when dirty
    graph: Option<RouteGraph>,

    // Configuration
    route_config: RouteConfig,
    ingest_config: IngestConfig,
}

impl RouteEngine {
    /// Create an engine backed by an empty in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryEdgeStore::new())
    }

    /// Create an engine over an existing store.
    pub fn with_store(store: impl EdgeStore + Send + 'static) -> Self {
        Self {
            store: Box::new(store),
            graph: None,
            route_config: RouteConfig::default(),
            ingest_config: IngestConfig::default(),
        }
    }

    /// Create an engine backed by the SQLite database at `db_path`.
    #[cfg(feature = "persistence")]
    pub fn open(db_path: &str) -> Result<Self> {
        let store = crate::persistence::SqliteEdgeStore::open(db_path)?;
        Ok(Self::with_store(store))
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn set_route_config(&mut self, config: RouteConfig) -> Result<()> {
        config.validate()?;
        self.route_config = config;
        Ok(())
    }

    pub fn set_ingest_config(&mut self, config: IngestConfig) {
        self.ingest_config = config;
    }

    pub fn route_config(&self) -> &RouteConfig {
        &self.route_config
    }

    pub fn ingest_config(&self) -> &IngestConfig {
        &self.ingest_config
    }

    // ========================================================================
    // Ingestion (writes)
    // ========================================================================

    /// Merge one decoded trace recorded at `avg_speed_mps`.
    pub fn ingest_points(&mut self, points: &[GpsPoint], avg_speed_mps: f64) -> Result<usize> {
        self.graph = None;
        ingest::ingest_trace(self.store.as_mut(), points, avg_speed_mps)
    }

    /// Merge a batch of activity summaries on top of the current store.
    pub fn ingest_activities(&mut self, activities: &[ActivitySummary]) -> Result<IngestStats> {
        self.graph = None;
        ingest::ingest_activities(self.store.as_mut(), activities, &self.ingest_config)
    }

    /// Clear every edge and rebuild the store from `activities`.
    pub fn reingest_activities(&mut self, activities: &[ActivitySummary]) -> Result<IngestStats> {
        self.clear()?;
        self.ingest_activities(activities)
    }

    /// Remove all edges.
    pub fn clear(&mut self) -> Result<()> {
        self.graph = None;
        self.store.clear()?;
        info!("[PopularRoutes] Edge store cleared");
        Ok(())
    }

    // ========================================================================
    // Queries (reads)
    // ========================================================================

    /// Snapshot of every stored edge.
    pub fn edges(&self) -> Result<Vec<SegmentEdge>> {
        self.store.edges()
    }

    pub fn edge_count(&self) -> Result<usize> {
        self.store.edge_count()
    }

    fn ensure_graph(&mut self) -> Result<()> {
        if self.graph.is_none() {
            let edges = self.store.edges()?;
            self.graph = Some(RouteGraph::from_edges(&edges));
            debug!("[PopularRoutes] Rebuilt search graph from {} edges", edges.len());
        }
        Ok(())
    }

    /// Current search graph, rebuilt from the store if a write happened
    /// since the last query.
    pub fn build_graph(&mut self) -> Result<&RouteGraph> {
        self.ensure_graph()?;
        self.graph.as_ref().ok_or_internal("graph missing after rebuild")
    }

    /// Recommend a route between two coordinates for a ride of roughly
    /// `target_km`. `Ok(None)` means there is not enough route data.
    pub fn recommend(
        &mut self,
        start: GpsPoint,
        end: GpsPoint,
        target_km: f64,
    ) -> Result<Option<RouteRecommendation>> {
        self.ensure_graph()?;
        let graph = self.graph.as_ref().ok_or_internal("graph missing after rebuild")?;

        let result = routing::recommend(graph, &start, &end, target_km, &self.route_config)?;
        match &result {
            Some(route) => info!(
                "[PopularRoutes] Recommended {} nodes, {:.0}m, score {:.3}",
                route.path.len(),
                route.total_distance_m,
                route.score
            ),
            None => info!(
                "[PopularRoutes] No route between ({:.4}, {:.4}) and ({:.4}, {:.4})",
                start.latitude, start.longitude, end.latitude, end.longitude
            ),
        }
        Ok(result)
    }

    /// [`RouteEngine::recommend`] with the configured default target length.
    pub fn recommend_default(
        &mut self,
        start: GpsPoint,
        end: GpsPoint,
    ) -> Result<Option<RouteRecommendation>> {
        let target_km = self.route_config.default_target_km;
        self.recommend(start, end, target_km)
    }

    /// Recommendation as JSON (`null` when no route exists).
    pub fn recommend_json(&mut self, start: GpsPoint, end: GpsPoint, target_km: f64) -> Result<String> {
        let result = self.recommend(start, end, target_km)?;
        serde_json::to_string(&result).map_err(|e| crate::RouteGraphError::Internal {
            message: format!("failed to serialize recommendation: {}", e),
        })
    }

    /// Get engine statistics.
    pub fn stats(&mut self) -> Result<EngineStats> {
        let graph_cached = self.graph.is_some();
        let edge_count = self.store.edge_count()? as u32;
        let node_count = self.build_graph()?.node_count() as u32;
        Ok(EngineStats {
            edge_count,
            node_count,
            graph_cached,
        })
    }
}

impl Default for RouteEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct EngineStats {
    pub edge_count: u32,
    pub node_count: u32,
    /// Whether the search graph was already built before this call
    pub graph_cached: bool,
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global engine instance.
///
/// Holds the single shared edge store used by every caller in the process.
pub static ENGINE: Lazy<Mutex<RouteEngine>> = Lazy::new(|| Mutex::new(RouteEngine::new()));

/// Run `f` with exclusive access to the global engine.
///
/// A panic inside an earlier caller does not lock the engine out: the
/// poisoned guard is recovered.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut RouteEngine) -> R,
{
    let mut engine = ENGINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut engine)
}
