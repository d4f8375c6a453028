//! # Butterfly-net CLI
//!
//! Command-line interface for the butterfly-net library.
//! Extracts a street network graph for a bounding box and writes it as CSV or JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use butterfly_net::{
    BboxSpec, BoundingBox, Error, Extractor, OsmFilter, OutputFormat, QueryOptions, Settings,
    DEFAULT_MAX_QUERY_AREA_SIZE,
};
use clap::Parser;
use log::{error, info};

mod cli;

/// Command-line interface for butterfly-net
#[derive(Parser, Debug)]
#[command(name = "butterfly-net")]
#[command(about = "Routable street-network extraction from the OpenStreetMap Overpass API")]
#[command(long_about = "Downloads the street network inside a bounding box and writes its intersection graph:
  butterfly-net --bbox=-122.2762,37.8211,-122.2547,37.8309
  butterfly-net --lat-min 37.8211 --lng-min -122.2547 --lat-max 37.8309 --lng-max -122.2762 --network drive
  butterfly-net --bbox=-122.28,37.82,-122.25,37.83 --format json --output ./berkeley

Bounds follow the OSM convention: lng-max is the western edge, lng-min the eastern edge.")]
#[command(version = env!("BUTTERFLY_VERSION"))]
struct Cli {
    /// Bounding box as west,south,east,north (lng_max,lat_min,lng_min,lat_max)
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,

    /// Southern latitude
    #[arg(long, allow_hyphen_values = true)]
    lat_min: Option<f64>,

    /// Eastern longitude
    #[arg(long, allow_hyphen_values = true)]
    lng_min: Option<f64>,

    /// Northern latitude
    #[arg(long, allow_hyphen_values = true)]
    lat_max: Option<f64>,

    /// Western longitude
    #[arg(long, allow_hyphen_values = true)]
    lng_max: Option<f64>,

    /// Network type: walk or drive
    #[arg(long, default_value = "walk")]
    network: String,

    /// Raw Overpass predicate replacing the network filter, e.g. '["highway"="service"]'
    #[arg(long)]
    filter: Option<String>,

    /// Emit the reverse of every edge as well
    #[arg(long)]
    both_directions: bool,

    /// Overpass and HTTP timeout in seconds
    #[arg(long, default_value_t = 180)]
    timeout: u64,

    /// Overpass server memory allocation in bytes
    #[arg(long)]
    memory: Option<u64>,

    /// Max area of one sub-region query in square meters
    #[arg(long, default_value_t = DEFAULT_MAX_QUERY_AREA_SIZE)]
    max_area: f64,

    /// Fixed pause in seconds before the first retry of an overloaded server
    #[arg(long)]
    error_pause: Option<u64>,

    /// TOML settings file (tag allow-list, Overpass endpoints)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    format: OutputFormat,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Print the sub-region queries without sending them
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn bbox_spec(&self) -> Result<BboxSpec> {
        let bbox = match &self.bbox {
            Some(text) => {
                let parsed: BoundingBox = text.parse()?;
                Some((parsed.west, parsed.south, parsed.east, parsed.north))
            }
            None => None,
        };
        Ok(BboxSpec {
            lat_min: self.lat_min,
            lng_min: self.lng_min,
            lat_max: self.lat_max,
            lng_max: self.lng_max,
            bbox,
        })
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            timeout: self.timeout,
            memory: self.memory,
            max_query_area_size: self.max_area,
            error_pause: self.error_pause.map(Duration::from_secs),
            directed: !self.both_directions,
            progress: None,
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Error: {e:#}");
        if let Some(hint) = empty_result_hint(&e) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

fn empty_result_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .downcast_ref::<Error>()
        .filter(|e| e.is_empty_result())
        .map(|_| "Hint: try a larger bounding box or a broader --filter")
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let mut logger = env_logger::Builder::from_default_env();
    logger.target(env_logger::Target::Stderr);
    if cli.verbose {
        logger.filter_module("butterfly_net", log::LevelFilter::Debug);
    }
    logger.init();

    if cli.verbose {
        eprintln!("Butterfly-net v{} starting...", env!("BUTTERFLY_VERSION"));
    }

    let settings = load_settings(cli.config.as_deref())?;
    let bbox_spec = cli.bbox_spec()?;
    let bbox = bbox_spec.resolve()?;
    let filter = OsmFilter::resolve(&cli.network, cli.filter.as_deref())?;
    let mut options = cli.query_options();

    let extractor = Extractor::with_settings(settings);
    let queries = extractor.region_queries(&bbox, &filter, &options)?;

    if cli.dry_run {
        eprintln!("[DRY RUN] Would send {} Overpass request(s):", queries.len());
        for query in &queries {
            println!("{query}");
        }
        return Ok(());
    }

    let progress_manager = cli::ProgressManager::new(
        queries.len() as u64,
        &format!("Extracting {} network", filter_label(&filter)),
    );
    options.progress = Some(Arc::new(progress_manager.callback()));

    let graph = extractor
        .network_from_bbox(&bbox_spec, &filter, &options)
        .await?;

    let written = butterfly_net::write_graph(
        &graph,
        &cli.output,
        cli.format,
        &extractor.settings().keep_osm_tags,
    )
    .with_context(|| format!("writing {} output to {}", cli.format, cli.output.display()))?;

    info!(
        "Wrote graph with {} nodes and {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    for path in written {
        eprintln!("Saved {}", path.display());
    }

    Ok(())
}

fn filter_label(filter: &OsmFilter) -> String {
    match filter {
        OsmFilter::Network(network_type) => network_type.to_string(),
        OsmFilter::Custom(_) => "custom".to_string(),
    }
}
