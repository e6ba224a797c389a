//! # Popularity-Weighted Pathfinding
//!
//! Dijkstra search over a [`RouteGraph`] where each edge is charged
//!
//! ```text
//! distance_penalty = d / max(target_km * 1000, min_target_m)
//! popularity_bonus = min(p, popularity_cap) * popularity_weight
//! edge_cost        = max(min_edge_cost, distance_penalty - popularity_bonus)
//! ```
//!
//! With the default [`RouteConfig`] a popularity of 20 or more earns the
//! full 0.8 bonus, and no edge is ever cheaper than 0.02, so the search
//! cannot loop on zero-cost cycles.
//!
//! The physical distance is accumulated alongside the cost, and the final
//! `score = max(0, 1 - cost)` is a display-only quality indicator.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, RouteGraphError};
use crate::geo_utils::NodeKey;
use crate::graph::RouteGraph;
use crate::{GpsPoint, RouteConfig};

/// A recommended route through the popularity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecommendation {
    /// Node coordinates from start to end
    pub path: Vec<GpsPoint>,
    /// Node keys matching `path`
    pub node_keys: Vec<NodeKey>,
    /// Sum of edge distances along the path, in meters
    pub total_distance_m: f64,
    /// max(0, 1 - total cost); 1.0 for a single-node route
    pub score: f64,
}

/// Cost of traversing one edge. Returns the raw (non-finite) value unchanged
/// when the inputs are not finite so callers can reject it.
pub fn edge_cost(distance_m: f64, popularity: u32, target_km: f64, config: &RouteConfig) -> f64 {
    let distance_penalty = distance_m / config.distance_scale_m(target_km);
    let popularity_bonus = popularity.min(config.popularity_cap) as f64 * config.popularity_weight;
    let raw = distance_penalty - popularity_bonus;
    if raw.is_finite() {
        raw.max(config.min_edge_cost)
    } else {
        raw
    }
}

/// Min-heap entry: lowest cost first, then smallest key.
#[derive(Debug)]
struct Frontier {
    cost: f64,
    node: NodeKey,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Snap `start` and `end` onto the graph and search between them.
///
/// Returns `Ok(None)` when the graph is empty or the snapped destination is
/// unreachable from the snapped source.
pub fn recommend(
    graph: &RouteGraph,
    start: &GpsPoint,
    end: &GpsPoint,
    target_km: f64,
    config: &RouteConfig,
) -> Result<Option<RouteRecommendation>> {
    if graph.is_empty() {
        debug!("No route data available");
        return Ok(None);
    }

    let Some(source) = graph.nearest_node(start)? else {
        return Ok(None);
    };
    let Some(destination) = graph.nearest_node(end)? else {
        return Ok(None);
    };
    debug!("Snapped request to {} -> {}", source, destination);

    find_route(graph, &source, &destination, target_km, config)
}

/// Lowest-cost route between two nodes of `graph`.
///
/// The search stops as soon as `destination` is popped from the queue. When
/// `source == destination` the result is the single node with distance 0
/// and score 1.0.
pub fn find_route(
    graph: &RouteGraph,
    source: &NodeKey,
    destination: &NodeKey,
    target_km: f64,
    config: &RouteConfig,
) -> Result<Option<RouteRecommendation>> {
    if !target_km.is_finite() || target_km < 0.0 {
        return Err(RouteGraphError::Config {
            message: format!("target_km must be a non-negative number, got {}", target_km),
        });
    }

    let mut costs: HashMap<NodeKey, f64> = HashMap::new();
    let mut distances: HashMap<NodeKey, f64> = HashMap::new();
    let mut parents: HashMap<NodeKey, NodeKey> = HashMap::new();
    let mut queue = BinaryHeap::new();

    costs.insert(source.clone(), 0.0);
    distances.insert(source.clone(), 0.0);
    queue.push(Frontier {
        cost: 0.0,
        node: source.clone(),
    });

    let mut settled = 0usize;
    while let Some(Frontier { cost, node }) = queue.pop() {
        if node == *destination {
            break;
        }
        if cost > costs.get(&node).copied().unwrap_or(f64::INFINITY) {
            continue;
        }
        settled += 1;

        let distance_so_far = distances.get(&node).copied().unwrap_or(0.0);
        for neighbor in graph.neighbors(&node) {
            if !neighbor.distance_m.is_finite() || neighbor.distance_m < 0.0 {
                return Err(RouteGraphError::InvalidDistance {
                    start_key: node.to_string(),
                    end_key: neighbor.node.to_string(),
                    distance_m: neighbor.distance_m,
                });
            }

            let step = edge_cost(neighbor.distance_m, neighbor.popularity, target_km, config);
            if !step.is_finite() {
                return Err(RouteGraphError::NonFiniteCost {
                    from: node.to_string(),
                    to: neighbor.node.to_string(),
                });
            }

            let next_cost = cost + step;
            if next_cost < costs.get(&neighbor.node).copied().unwrap_or(f64::INFINITY) {
                costs.insert(neighbor.node.clone(), next_cost);
                distances.insert(neighbor.node.clone(), distance_so_far + neighbor.distance_m);
                parents.insert(neighbor.node.clone(), node.clone());
                queue.push(Frontier {
                    cost: next_cost,
                    node: neighbor.node.clone(),
                });
            }
        }
    }

    if source != destination && !parents.contains_key(destination) {
        debug!(
            "No route from {} to {} ({} nodes settled)",
            source, destination, settled
        );
        return Ok(None);
    }

    let node_keys = reconstruct_path(&parents, source, destination)?;
    let path = node_keys
        .iter()
        .map(NodeKey::to_coordinate)
        .collect::<Result<Vec<_>>>()?;

    let total_cost = costs.get(destination).copied().unwrap_or(0.0);
    let total_distance_m = distances.get(destination).copied().unwrap_or(0.0);

    debug!(
        "Route found: {} nodes, {:.0}m, cost {:.3} ({} nodes settled)",
        node_keys.len(),
        total_distance_m,
        total_cost,
        settled
    );

    Ok(Some(RouteRecommendation {
        path,
        node_keys,
        total_distance_m,
        score: (1.0 - total_cost).max(0.0),
    }))
}

/// Walk parent pointers from `destination` back to `source`.
fn reconstruct_path(
    parents: &HashMap<NodeKey, NodeKey>,
    source: &NodeKey,
    destination: &NodeKey,
) -> Result<Vec<NodeKey>> {
    let mut path = vec![destination.clone()];
    let mut current = destination;
    while current != source {
        if path.len() > parents.len() + 1 {
            return Err(RouteGraphError::Internal {
                message: format!("parent chain from {} does not reach {}", destination, source),
            });
        }
        current = parents
            .get(current)
            .ok_or_internal("parent chain broken during reconstruction")?;
        path.push(current.clone());
    }
    path.reverse();
    Ok(path)
}
