//! Writing graphs as CSV tables or JSON
//!
//! Tag maps become fixed columns here and nowhere else: one column per
//! allow-listed tag, empty where an edge lacks the tag.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::Writer;

use crate::core::error::{Error, Result};
use crate::core::graph::Graph;

pub const NODES_FILE: &str = "nodes.csv";
pub const EDGES_FILE: &str = "edges.csv";
pub const GRAPH_FILE: &str = "graph.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `nodes.csv` and `edges.csv`
    #[default]
    Csv,
    /// A single `graph.json`
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown output format \"{other}\" (expected csv or json)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Write the node table as `id,x,y`
pub fn write_nodes_csv<W: Write>(graph: &Graph, writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(["id", "x", "y"])?;
    for node in &graph.nodes {
        writer.write_record([node.id.to_string(), node.x.to_string(), node.y.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the edge table as `from,to,distance` followed by `tag_columns`
pub fn write_edges_csv<W: Write>(graph: &Graph, tag_columns: &[String], writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);

    let mut header = vec!["from".to_string(), "to".to_string(), "distance".to_string()];
    header.extend(tag_columns.iter().cloned());
    writer.write_record(&header)?;

    for edge in &graph.edges {
        let mut record = vec![
            edge.from.to_string(),
            edge.to.to_string(),
            edge.distance.to_string(),
        ];
        record.extend(
            tag_columns
                .iter()
                .map(|tag| edge.tags.get(tag).cloned().unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(graph: &Graph, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, graph)?;
    Ok(())
}

/// Write a graph into `dir`, creating it if needed; returns the written paths
pub fn write_graph(
    graph: &Graph,
    dir: &Path,
    format: OutputFormat,
    tag_columns: &[String],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    match format {
        OutputFormat::Csv => {
            let nodes_path = dir.join(NODES_FILE);
            let edges_path = dir.join(EDGES_FILE);
            write_nodes_csv(graph, File::create(&nodes_path)?)?;
            write_edges_csv(graph, tag_columns, File::create(&edges_path)?)?;
            Ok(vec![nodes_path, edges_path])
        }
        OutputFormat::Json => {
            let path = dir.join(GRAPH_FILE);
            write_json(graph, File::create(&path)?)?;
            Ok(vec![path])
        }
    }
}
