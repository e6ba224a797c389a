//! # Popularity Aggregation
//!
//! Merges observed segments into the shared edge store.
//!
//! Edge identity is the **ordered** `(start_key, end_key)` pair: riding the
//! same road in the opposite direction builds up a separate edge with its own
//! popularity. The search graph later adds both directions of every stored
//! edge, so reverse traversal is still possible even when only one direction
//! was ever recorded.
//!
//! ## Merge rule
//!
//! For an existing edge with count `n`:
//! - `popularity_count = n + 1`
//! - `avg_speed_mps = (avg_speed_mps * n + v) / (n + 1)` (count-weighted mean)
//! - `distance_m = (distance_m + d) / 2` (two-point mean, not count-weighted)
//!
//! Under the distance rule the latest observation always carries half the
//! weight, however many traversals the edge already has.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteGraphError};
use crate::geo_utils::NodeKey;
use crate::segments::SegmentObservation;

/// An observed directed road segment with its running statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEdge {
    pub start_key: NodeKey,
    pub end_key: NodeKey,
    /// Running two-point mean of observed distances, in meters
    pub distance_m: f64,
    /// Number of ride traversals merged into this edge (always >= 1)
    pub popularity_count: u32,
    /// Count-weighted mean of traversal speeds, in m/s
    pub avg_speed_mps: f64,
}

impl SegmentEdge {
    /// A freshly observed edge with popularity 1.
    pub fn new(start_key: NodeKey, end_key: NodeKey, distance_m: f64, avg_speed_mps: f64) -> Self {
        Self {
            start_key,
            end_key,
            distance_m,
            popularity_count: 1,
            avg_speed_mps,
        }
    }

    /// Fold one more traversal into the running statistics.
    pub fn merge_observation(&mut self, distance_m: f64, avg_speed_mps: f64) {
        let n = self.popularity_count as f64;
        self.avg_speed_mps = (self.avg_speed_mps * n + avg_speed_mps) / (n + 1.0);
        self.popularity_count = self.popularity_count.saturating_add(1);
        self.distance_m = (self.distance_m + distance_m) / 2.0;
    }
}

/// Storage for the shared, directed edge set.
///
/// Implementors supply keyed reads and writes; the merge itself lives in
/// [`upsert_edge`] so every store applies the same rule. Stores may override
/// [`EdgeStore::upsert`] and [`EdgeStore::upsert_batch`] when they can merge
/// atomically on their own.
pub trait EdgeStore {
    /// Look up the edge stored for the exact ordered pair.
    fn get_edge(&self, start_key: &NodeKey, end_key: &NodeKey) -> Result<Option<SegmentEdge>>;

    /// Insert or overwrite the edge for its ordered pair.
    fn put_edge(&mut self, edge: SegmentEdge) -> Result<()>;

    /// Snapshot of every stored edge, ordered by `(start_key, end_key)`.
    fn edges(&self) -> Result<Vec<SegmentEdge>>;

    fn edge_count(&self) -> Result<usize>;

    /// Bulk reset before a full re-ingestion.
    fn clear(&mut self) -> Result<()>;

    /// Merge one observation into the store.
    fn upsert(
        &mut self,
        start_key: &NodeKey,
        end_key: &NodeKey,
        distance_m: f64,
        avg_speed_mps: f64,
    ) -> Result<()> {
        upsert_edge(self, start_key, end_key, distance_m, avg_speed_mps)
    }

    /// Merge every observation of one trace, all carrying the trace's
    /// average speed. Observations are validated up front so a bad one
    /// leaves the store untouched. Returns the number merged.
    fn upsert_batch(
        &mut self,
        observations: &[SegmentObservation],
        avg_speed_mps: f64,
    ) -> Result<usize> {
        for obs in observations {
            validate_observation(&obs.start_key, &obs.end_key, obs.distance_m, avg_speed_mps)?;
        }
        for obs in observations {
            self.upsert(&obs.start_key, &obs.end_key, obs.distance_m, avg_speed_mps)?;
        }
        Ok(observations.len())
    }
}

/// Read-then-write merge of one observation into `store`.
///
/// Inserts a new edge with popularity 1 when the ordered pair is unknown,
/// otherwise applies [`SegmentEdge::merge_observation`]. Callers must hold
/// exclusive access to the store for the duration of the call.
pub fn upsert_edge<S: EdgeStore + ?Sized>(
    store: &mut S,
    start_key: &NodeKey,
    end_key: &NodeKey,
    distance_m: f64,
    avg_speed_mps: f64,
) -> Result<()> {
    validate_observation(start_key, end_key, distance_m, avg_speed_mps)?;

    let edge = match store.get_edge(start_key, end_key)? {
        Some(mut existing) => {
            existing.merge_observation(distance_m, avg_speed_mps);
            existing
        }
        None => SegmentEdge::new(start_key.clone(), end_key.clone(), distance_m, avg_speed_mps),
    };
    store.put_edge(edge)
}

/// Reject observations that would corrupt the running statistics.
pub(crate) fn validate_observation(
    start_key: &NodeKey,
    end_key: &NodeKey,
    distance_m: f64,
    avg_speed_mps: f64,
) -> Result<()> {
    if start_key == end_key {
        return Err(RouteGraphError::ZeroLengthEdge {
            key: start_key.to_string(),
        });
    }
    if !distance_m.is_finite() || distance_m < 0.0 {
        return Err(RouteGraphError::InvalidDistance {
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            distance_m,
        });
    }
    if !avg_speed_mps.is_finite() || avg_speed_mps < 0.0 {
        return Err(RouteGraphError::InvalidSpeed {
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            speed_mps: avg_speed_mps,
        });
    }
    Ok(())
}

/// Average speed of a whole trace: distance over moving time, with moving
/// time clamped to at least one second.
pub fn trace_average_speed(distance_m: f64, moving_time_s: f64) -> f64 {
    let moving_time = if moving_time_s.is_finite() {
        moving_time_s.max(1.0)
    } else {
        1.0
    };
    distance_m / moving_time
}

// ============================================================================
// In-memory store
// ============================================================================

/// Edge store held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryEdgeStore {
    edges: BTreeMap<(NodeKey, NodeKey), SegmentEdge>,
}

impl MemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from existing edges (e.g. a snapshot or fixture).
    pub fn from_edges(edges: impl IntoIterator<Item = SegmentEdge>) -> Self {
        Self {
            edges: edges
                .into_iter()
                .map(|e| ((e.start_key.clone(), e.end_key.clone()), e))
                .collect(),
        }
    }
}

impl EdgeStore for MemoryEdgeStore {
    fn get_edge(&self, start_key: &NodeKey, end_key: &NodeKey) -> Result<Option<SegmentEdge>> {
        Ok(self
            .edges
            .get(&(start_key.clone(), end_key.clone()))
            .cloned())
    }

    fn put_edge(&mut self, edge: SegmentEdge) -> Result<()> {
        self.edges
            .insert((edge.start_key.clone(), edge.end_key.clone()), edge);
        Ok(())
    }

    fn edges(&self) -> Result<Vec<SegmentEdge>> {
        Ok(self.edges.values().cloned().collect())
    }

    fn edge_count(&self) -> Result<usize> {
        Ok(self.edges.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.edges.clear();
        Ok(())
    }
}
