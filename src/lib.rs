//! # Butterfly-net Library
//!
//! Extracts routable street networks from the OpenStreetMap Overpass API.
//!
//! ## Features
//!
//! - **Region partitioning**: large bounding boxes are split into
//!   Overpass-sized sub-regions in a local UTM projection
//! - **Resilient requests**: overloaded-server responses are retried after a
//!   pause discovered from the Overpass status endpoint
//! - **Intersection graphs**: ways collapse into edges between intersection
//!   nodes, with haversine lengths and allow-listed OSM tags
//! - **Progress tracking**: optional per-sub-region progress callbacks
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use butterfly_net::{BboxSpec, QueryOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // (lng_max, lat_min, lng_min, lat_max), i.e. west, south, east, north
//!     let bbox = BboxSpec::from_tuple((-122.2762, 37.8211, -122.2547, 37.8309));
//!     let graph = butterfly_net::network_from_bbox(bbox, "walk", None, QueryOptions::default()).await?;
//!     println!("{} nodes, {} edges", graph.nodes.len(), graph.edges.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Settings
//!
//! ```rust,no_run
//! use butterfly_net::{BboxSpec, Extractor, OsmFilter, QueryOptions, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings {
//!         keep_osm_tags: vec!["highway".to_string(), "name".to_string()],
//!         ..Default::default()
//!     };
//!     let extractor = Extractor::with_settings(settings);
//!     let graph = extractor
//!         .network_from_bbox(
//!             &BboxSpec::from_bounds(37.8211, -122.2547, 37.8309, -122.2762),
//!             &OsmFilter::Custom("[\"highway\"=\"service\"]".to_string()),
//!             &QueryOptions { directed: false, ..Default::default() },
//!         )
//!         .await?;
//!     println!("{} edges", graph.edges.len());
//!     Ok(())
//! }
//! ```

pub use crate::core::config::{OverpassConfig, Settings, DEFAULT_KEEP_OSM_TAGS};
pub use crate::core::elements::{
    merge_elements, parse_network_osm_query, process_node, process_way, Element, Node,
    OsmTables, OverpassResponse, RawNode, RawWay, Tags, Way, WayNode,
};
pub use crate::core::error::{suggest_network_type, Error, Result};
pub use crate::core::graph::{
    build as build_graph, great_circle_dist, intersection_nodes, node_pairs, Edge, Graph,
    GraphNode, EARTH_RADIUS_M,
};
pub use crate::core::network::{sub_regions, Extractor};
pub use crate::core::options::{ProgressCallback, QueryOptions, DEFAULT_MAX_QUERY_AREA_SIZE};
pub use crate::core::output::{
    write_edges_csv, write_graph, write_json, write_nodes_csv, OutputFormat, EDGES_FILE,
    GRAPH_FILE, NODES_FILE,
};
pub use crate::core::overpass::{parse_status, OverpassClient, SlotStatus};
pub use crate::core::partition::{
    partition, quadrat_cut_geometry, DEFAULT_BUFFER_AMOUNT, DEFAULT_MIN_NUM,
};
pub use crate::core::projection::{project_geometry, utm_to_wgs84, wgs84_to_utm, Crs};
pub use crate::core::query::{build_query, BboxSpec, BoundingBox, NetworkType, OsmFilter};

// Internal modules
mod core;

/// Build the street network graph inside a bounding box
///
/// Uses the public Overpass instance and the default tag allow-list.
/// `custom_osm_filter`, when given, replaces the filter of `network_type`.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use butterfly_net::{BboxSpec, QueryOptions};
///
/// let graph = butterfly_net::network_from_bbox(
///     BboxSpec::from_bounds(37.8211, -122.2547, 37.8309, -122.2762),
///     "drive",
///     None,
///     QueryOptions::default(),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn network_from_bbox(
    bbox: BboxSpec,
    network_type: &str,
    custom_osm_filter: Option<&str>,
    options: QueryOptions,
) -> Result<Graph> {
    let filter = OsmFilter::resolve(network_type, custom_osm_filter)?;
    Extractor::new()
        .network_from_bbox(&bbox, &filter, &options)
        .await
}
