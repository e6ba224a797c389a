//! Route graph assembly and nearest-node resolution.
//!
//! Stored edges are directed, but the search treats the road network as
//! undirected: every edge is added in both directions, each carrying the
//! popularity accumulated for the stored direction. The node set is derived
//! from the edges and rebuilt with the graph.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::error::Result;
use crate::geo_utils::{haversine_distance, NodeKey};
use crate::popularity::SegmentEdge;
use crate::GpsPoint;

/// One outgoing adjacency entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub node: NodeKey,
    pub distance_m: f64,
    pub popularity: u32,
}

/// In-memory bidirectional adjacency built from an edge snapshot.
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    adjacency: HashMap<NodeKey, Vec<Neighbor>>,
    nodes: BTreeSet<NodeKey>,
}

impl RouteGraph {
    /// Build the search graph from every stored edge.
    pub fn from_edges(edges: &[SegmentEdge]) -> Self {
        let mut adjacency: HashMap<NodeKey, Vec<Neighbor>> = HashMap::new();
        let mut nodes = BTreeSet::new();

        for edge in edges {
            adjacency
                .entry(edge.start_key.clone())
                .or_default()
                .push(Neighbor {
                    node: edge.end_key.clone(),
                    distance_m: edge.distance_m,
                    popularity: edge.popularity_count,
                });
            adjacency
                .entry(edge.end_key.clone())
                .or_default()
                .push(Neighbor {
                    node: edge.start_key.clone(),
                    distance_m: edge.distance_m,
                    popularity: edge.popularity_count,
                });
            nodes.insert(edge.start_key.clone());
            nodes.insert(edge.end_key.clone());
        }

        debug!(
            "Assembled route graph: {} nodes from {} stored edges",
            nodes.len(),
            edges.len()
        );

        Self { adjacency, nodes }
    }

    /// True when no edges were available ("no route data").
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of adjacency entries (twice the stored edge count).
    pub fn adjacency_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> &BTreeSet<NodeKey> {
        &self.nodes
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains(key)
    }

    /// Adjacency list of `key`; empty for unknown nodes.
    pub fn neighbors(&self, key: &NodeKey) -> &[Neighbor] {
        self.adjacency.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Snap a coordinate onto the closest node of this graph.
    pub fn nearest_node(&self, target: &GpsPoint) -> Result<Option<NodeKey>> {
        nearest_node(target, &self.nodes)
    }
}

/// Build the search graph from an edge snapshot.
pub fn build_graph(edges: &[SegmentEdge]) -> RouteGraph {
    RouteGraph::from_edges(edges)
}

/// Return the node whose coordinate is closest (haversine) to `target`.
///
/// Returns `None` for an empty node set. Equal distances resolve to the
/// lexicographically smallest key. Fails on an invalid target or on a key
/// that does not decode.
#[cfg(not(feature = "parallel"))]
pub fn nearest_node(target: &GpsPoint, nodes: &BTreeSet<NodeKey>) -> Result<Option<NodeKey>> {
    target.validate()?;

    let mut best: Option<(f64, &NodeKey)> = None;
    // BTreeSet iterates in key order, so keeping the first of equal
    // distances keeps the smallest key
    for key in nodes {
        let distance = haversine_distance(target, &key.to_coordinate()?);
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, key)),
        }
    }

    Ok(best.map(|(_, key)| key.clone()))
}

/// Return the node whose coordinate is closest (haversine) to `target`.
///
/// Returns `None` for an empty node set. Equal distances resolve to the
/// lexicographically smallest key. Fails on an invalid target or on a key
/// that does not decode.
#[cfg(feature = "parallel")]
pub fn nearest_node(target: &GpsPoint, nodes: &BTreeSet<NodeKey>) -> Result<Option<NodeKey>> {
    use rayon::prelude::*;

    target.validate()?;

    let best = nodes
        .par_iter()
        .map(|key| {
            key.to_coordinate()
                .map(|coord| (haversine_distance(target, &coord), key))
        })
        .try_reduce_with(|a, b| {
            let b_wins = b.0 < a.0 || (b.0 == a.0 && b.1 < a.1);
            Ok(if b_wins { b } else { a })
        })
        .transpose()?;

    Ok(best.map(|(_, key)| key.clone()))
}
