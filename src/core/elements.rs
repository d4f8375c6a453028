//! Overpass elements and their assembly into node, way and way-node tables

use std::collections::{BTreeMap, HashSet};

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Allow-listed OSM tags of one node, way or edge
pub type Tags = BTreeMap<String, String>;

/// One decoded Overpass JSON response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,

    /// Server-side remark, e.g. a runtime warning; never an error by itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// A raw element as returned by `out;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node(RawNode),
    Way(RawWay),
    /// Relations, areas and anything else Overpass might send
    #[serde(other)]
    Other,
}

#[cfg(test)]
impl Element {
    /// Id of a node or way; `None` for any other element
    pub(crate) fn id(&self) -> Option<u64> {
        match self {
            Element::Node(node) => Some(node.id),
            Element::Way(way) => Some(way.id),
            Element::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWay {
    pub id: u64,
    #[serde(default)]
    pub nodes: Vec<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

/// A parsed OSM node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

/// A parsed OSM way with its ordered node references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: u64,
    pub nodes: Vec<u64>,
    pub tags: Tags,
}

/// One occurrence of a node inside a way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WayNode {
    pub way_id: u64,
    pub node_id: u64,
    /// Index of the occurrence within the way
    pub position: usize,
}

/// Node, way and way-node tables of one extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsmTables {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
    pub way_nodes: Vec<WayNode>,
}

/// Merge the elements of several sub-region responses
///
/// Nodes come first, then ways. Within each kind an id is kept once, from the
/// first response that returned it. Elements of any other kind are dropped.
pub fn merge_elements<I>(responses: I) -> Vec<Element>
where
    I: IntoIterator<Item = OverpassResponse>,
{
    let mut nodes = Vec::new();
    let mut ways = Vec::new();
    let mut seen_nodes = HashSet::new();
    let mut seen_ways = HashSet::new();
    let mut record_count = 0usize;

    for response in responses {
        for element in response.elements {
            record_count += 1;
            match element {
                Element::Node(node) => {
                    if seen_nodes.insert(node.id) {
                        nodes.push(Element::Node(node));
                    }
                }
                Element::Way(way) => {
                    if seen_ways.insert(way.id) {
                        ways.push(Element::Way(way));
                    }
                }
                Element::Other => {}
            }
        }
    }

    nodes.append(&mut ways);

    let removed = record_count - nodes.len();
    if removed > 0 {
        info!("{removed} duplicate or unsupported records removed");
    }

    nodes
}

fn filter_tags(tags: &Tags, keep_osm_tags: &[String]) -> Tags {
    tags.iter()
        .filter(|(key, _)| keep_osm_tags.iter().any(|keep| keep == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Keep id, position and allow-listed tags of a node
pub fn process_node(raw: &RawNode, keep_osm_tags: &[String]) -> Node {
    Node {
        id: raw.id,
        lat: raw.lat,
        lon: raw.lon,
        tags: filter_tags(&raw.tags, keep_osm_tags),
    }
}

/// Keep id and allow-listed tags of a way, plus one way-node per reference
pub fn process_way(raw: &RawWay, keep_osm_tags: &[String]) -> (Way, Vec<WayNode>) {
    let way_nodes = raw
        .nodes
        .iter()
        .enumerate()
        .map(|(position, &node_id)| WayNode {
            way_id: raw.id,
            node_id,
            position,
        })
        .collect();

    let way = Way {
        id: raw.id,
        nodes: raw.nodes.clone(),
        tags: filter_tags(&raw.tags, keep_osm_tags),
    };

    (way, way_nodes)
}

/// Convert merged elements into node, way and way-node tables
///
/// An element list with no elements at all is an error; a list with nodes
/// but no ways parses fine into an empty way table.
pub fn parse_network_osm_query(
    elements: &[Element],
    keep_osm_tags: &[String],
) -> Result<OsmTables> {
    if elements.is_empty() {
        return Err(Error::NoData("OSM query results contain no data".to_string()));
    }

    let mut tables = OsmTables::default();
    for element in elements {
        match element {
            Element::Node(raw) => tables.nodes.push(process_node(raw, keep_osm_tags)),
            Element::Way(raw) => {
                let (way, way_nodes) = process_way(raw, keep_osm_tags);
                tables.ways.push(way);
                tables.way_nodes.extend(way_nodes);
            }
            Element::Other => {}
        }
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;

    fn keep() -> Vec<String> {
        Settings::default().keep_osm_tags
    }

    fn node(id: u64, lat: f64, lon: f64) -> Element {
        Element::Node(RawNode {
            id,
            lat,
            lon,
            tags: Tags::new(),
        })
    }

    fn way(id: u64, nodes: &[u64], highway: &str) -> Element {
        Element::Way(RawWay {
            id,
            nodes: nodes.to_vec(),
            tags: Tags::from([("highway".to_string(), highway.to_string())]),
        })
    }

    #[test]
    fn test_decode_overpass_json() {
        let json = r#"{
            "version": 0.6,
            "generator": "Overpass API",
            "remark": "runtime warning: something",
            "elements": [
                {"type": "node", "id": 53020977, "lat": 37.8659, "lon": -122.2588},
                {"type": "node", "id": 53041093, "lat": 37.8661, "lon": -122.2585,
                 "tags": {"highway": "traffic_signals"}},
                {"type": "way", "id": 188434143, "nodes": [53020977, 53041093],
                 "tags": {"highway": "secondary", "name": "Telegraph Avenue"}},
                {"type": "relation", "id": 1, "members": []}
            ]
        }"#;

        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.remark.as_deref(), Some("runtime warning: something"));
        assert_eq!(response.elements.len(), 4);
        assert!(matches!(response.elements[0], Element::Node(ref n) if n.tags.is_empty()));
        assert!(matches!(response.elements[2], Element::Way(ref w) if w.nodes.len() == 2));
        assert_eq!(response.elements[3], Element::Other);
    }

    #[test]
    fn test_process_node() {
        let mut raw = RawNode {
            id: 1,
            lat: 37.0,
            lon: -122.0,
            tags: Tags::new(),
        };
        let expected = Node {
            id: 1,
            lat: 37.0,
            lon: -122.0,
            tags: Tags::new(),
        };
        assert_eq!(process_node(&raw, &keep()), expected);

        raw.tags.insert("highway".to_string(), "crossing".to_string());
        raw.tags.insert("source".to_string(), "survey".to_string());
        let node = process_node(&raw, &keep());
        assert_eq!(node.tags, Tags::from([("highway".to_string(), "crossing".to_string())]));
    }

    #[test]
    fn test_process_way() {
        let raw = RawWay {
            id: 188434143,
            nodes: vec![53020977, 53041093],
            tags: Tags::from([
                ("source".to_string(), "source".to_string()),
                ("addr:city".to_string(), "Berkeley".to_string()),
                ("highway".to_string(), "secondary".to_string()),
                ("name".to_string(), "Telegraph Avenue".to_string()),
            ]),
        };

        let (way, way_nodes) = process_way(&raw, &keep());

        assert_eq!(way.id, 188434143);
        assert_eq!(way.nodes, vec![53020977, 53041093]);
        assert_eq!(
            way.tags,
            Tags::from([
                ("highway".to_string(), "secondary".to_string()),
                ("name".to_string(), "Telegraph Avenue".to_string()),
            ])
        );
        assert_eq!(
            way_nodes,
            vec![
                WayNode { way_id: 188434143, node_id: 53020977, position: 0 },
                WayNode { way_id: 188434143, node_id: 53041093, position: 1 },
            ]
        );
    }

    #[test]
    fn test_custom_allow_list() {
        let raw = RawWay {
            id: 7,
            nodes: vec![1, 2],
            tags: Tags::from([
                ("highway".to_string(), "service".to_string()),
                ("surface".to_string(), "gravel".to_string()),
            ]),
        };
        let (way, _) = process_way(&raw, &["surface".to_string()]);
        assert_eq!(way.tags, Tags::from([("surface".to_string(), "gravel".to_string())]));
    }

    #[test]
    fn test_merge_dedupes_first_seen_wins() {
        let first = OverpassResponse {
            elements: vec![node(1, 1.0, 1.0), node(2, 2.0, 2.0), way(10, &[1, 2], "residential")],
            remark: None,
        };
        let second = OverpassResponse {
            elements: vec![node(2, 9.0, 9.0), node(3, 3.0, 3.0), way(10, &[1, 2], "primary")],
            remark: None,
        };

        let merged = merge_elements(vec![first, second]);

        let ids: Vec<Option<u64>> = merged.iter().map(Element::id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(10)]);
        assert!(matches!(&merged[1], Element::Node(n) if n.lat == 2.0));
        assert!(matches!(&merged[3], Element::Way(w) if w.tags["highway"] == "residential"));
    }

    #[test]
    fn test_merge_same_id_node_and_way_both_kept() {
        let response = OverpassResponse {
            elements: vec![node(5, 0.0, 0.0), way(5, &[5], "path")],
            remark: None,
        };
        assert_eq!(merge_elements(vec![response]).len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let response = OverpassResponse {
            elements: vec![
                way(10, &[1, 2], "residential"),
                node(1, 1.0, 1.0),
                node(2, 2.0, 2.0),
                node(1, 1.0, 1.0),
            ],
            remark: None,
        };

        let once = merge_elements(vec![response.clone()]);
        let twice = merge_elements(vec![response.clone(), response]);
        assert_eq!(once, twice);

        let again = merge_elements(vec![OverpassResponse {
            elements: once.clone(),
            remark: None,
        }]);
        assert_eq!(again, once);
    }

    #[test]
    fn test_parse_empty_is_no_data() {
        let result = parse_network_osm_query(&[], &keep());
        assert!(matches!(result, Err(Error::NoData(_))));
    }

    #[test]
    fn test_parse_nodes_without_ways_is_valid() {
        let elements = vec![node(1, 1.0, 1.0), node(2, 2.0, 2.0)];
        let tables = parse_network_osm_query(&elements, &keep()).unwrap();
        assert_eq!(tables.nodes.len(), 2);
        assert!(tables.ways.is_empty());
        assert!(tables.way_nodes.is_empty());
    }

    #[test]
    fn test_parse_tables() {
        let elements = merge_elements(vec![OverpassResponse {
            elements: vec![
                node(1, 1.0, 1.0),
                node(2, 2.0, 2.0),
                node(3, 3.0, 3.0),
                way(10, &[1, 2, 3], "residential"),
                way(11, &[3, 1], "footway"),
            ],
            remark: None,
        }]);

        let tables = parse_network_osm_query(&elements, &keep()).unwrap();
        assert_eq!(tables.nodes.len(), 3);
        assert_eq!(tables.ways.len(), 2);
        assert_eq!(tables.way_nodes.len(), 5);
        let positions: Vec<(u64, usize)> = tables
            .way_nodes
            .iter()
            .filter(|wn| wn.way_id == 11)
            .map(|wn| (wn.node_id, wn.position))
            .collect();
        assert_eq!(positions, vec![(3, 0), (1, 1)]);
    }
}
