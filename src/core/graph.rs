//! Intersection graph construction
//!
//! Collapses ways into edges between intersection nodes: nodes referenced by
//! two or more way-node occurrences. Every other node is a pass-through point.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::elements::{Node, OsmTables, Tags, Way, WayNode};
use crate::core::error::{Error, Result};

/// Mean earth radius used for edge lengths, in meters
pub const EARTH_RADIUS_M: f64 = 6_372_795.0;

/// Haversine distance in meters between two lat/lon positions in degrees
pub fn great_circle_dist(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lon1 = lon1.to_radians();
    let lat2 = lat2.to_radians();
    let lon2 = lon2.to_radians();

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2);
    let b = lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * (a + b).sqrt().asin()
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// A graph vertex: `x` is longitude, `y` is latitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

/// A directed edge between two intersection nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: u64,
    pub to: u64,
    /// Meters, rounded to 6 decimals
    pub distance: f64,
    #[serde(default)]
    pub tags: Tags,
}

/// Final node and edge tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

/// Ids of nodes with two or more way-node occurrences
pub fn intersection_nodes(way_nodes: &[WayNode]) -> HashSet<u64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for way_node in way_nodes {
        *counts.entry(way_node.node_id).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect()
}

/// Emit one edge per consecutive pair of intersection nodes in each way
///
/// With `directed == false` the reverse edge is emitted right after each
/// edge. Edge tags are the way's tags that appear in `keep_osm_tags`.
pub fn node_pairs(
    nodes: &[Node],
    ways: &[Way],
    way_nodes: &[WayNode],
    directed: bool,
    keep_osm_tags: &[String],
) -> Result<Vec<Edge>> {
    let start_time = Instant::now();

    let intersections = intersection_nodes(way_nodes);
    let node_index: HashMap<u64, &Node> = nodes.iter().map(|n| (n.id, n)).collect();

    let mut way_map: HashMap<u64, Vec<&WayNode>> = HashMap::new();
    for way_node in way_nodes {
        way_map.entry(way_node.way_id).or_default().push(way_node);
    }
    for members in way_map.values_mut() {
        members.sort_by_key(|wn| wn.position);
    }

    let mut pairs = Vec::new();
    for way in ways {
        let Some(members) = way_map.get(&way.id) else {
            continue;
        };
        let nodes_in_way: Vec<u64> = members
            .iter()
            .map(|wn| wn.node_id)
            .filter(|id| intersections.contains(id))
            .collect();

        if nodes_in_way.len() < 2 {
            continue;
        }

        let tags: Tags = way
            .tags
            .iter()
            .filter(|(key, _)| keep_osm_tags.iter().any(|keep| keep == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for pair in nodes_in_way.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from == to {
                continue;
            }

            let lookup = |node_id: u64| {
                node_index.get(&node_id).copied().ok_or(Error::MissingNode {
                    way_id: way.id,
                    node_id,
                })
            };
            let from_node = lookup(from)?;
            let to_node = lookup(to)?;

            let distance = round6(great_circle_dist(
                from_node.lat,
                from_node.lon,
                to_node.lat,
                to_node.lon,
            ));

            pairs.push(Edge {
                from,
                to,
                distance,
                tags: tags.clone(),
            });

            if !directed {
                pairs.push(Edge {
                    from: to,
                    to: from,
                    distance,
                    tags: tags.clone(),
                });
            }
        }
    }

    if pairs.is_empty() {
        return Err(Error::NoEdges(
            "check your query parameters or bounding box".to_string(),
        ));
    }

    info!(
        "Edge node pairs completed. Took {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );
    Ok(pairs)
}

/// Build the final node and edge tables from parsed OSM tables
///
/// Only nodes used as an edge endpoint are kept, sorted by id.
pub fn build(tables: &OsmTables, directed: bool, keep_osm_tags: &[String]) -> Result<Graph> {
    let edges = node_pairs(
        &tables.nodes,
        &tables.ways,
        &tables.way_nodes,
        directed,
        keep_osm_tags,
    )?;

    let node_ids: BTreeSet<u64> = edges.iter().flat_map(|e| [e.from, e.to]).collect();
    let node_index: HashMap<u64, &Node> = tables.nodes.iter().map(|n| (n.id, n)).collect();

    let nodes = node_ids
        .into_iter()
        .filter_map(|id| node_index.get(&id))
        .map(|node| GraphNode {
            id: node.id,
            x: node.lon,
            y: node.lat,
        })
        .collect::<Vec<_>>();

    info!(
        "Returning processed graph with {} nodes and {} edges...",
        nodes.len(),
        edges.len()
    );

    Ok(Graph { nodes, edges })
}
