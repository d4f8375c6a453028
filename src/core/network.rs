//! Bounding box to street network extraction
//!
//! Splits the box into sub-regions, queries them one after another, merges
//! the responses and builds the intersection graph.

use std::time::Instant;

use geo::{BoundingRect, Geometry};
use log::{debug, info};

use crate::core::config::Settings;
use crate::core::elements::{merge_elements, parse_network_osm_query, Element, OsmTables};
use crate::core::error::{Error, Result};
use crate::core::graph::{self, Graph};
use crate::core::options::QueryOptions;
use crate::core::overpass::OverpassClient;
use crate::core::partition::partition;
use crate::core::projection::{project_geometry, Crs};
use crate::core::query::{build_query, BboxSpec, BoundingBox, OsmFilter};

/// Split a WGS84 bounding box into sub-regions of at most `max_area` m²
///
/// The box is projected to its UTM zone, partitioned in meters and projected
/// back; each piece is replaced by its own bounding box.
pub fn sub_regions(bbox: &BoundingBox, max_area: f64) -> Result<Vec<BoundingBox>> {
    let polygon = Geometry::Polygon(bbox.to_polygon());
    let (projected, crs) = project_geometry(&polygon, Crs::Wgs84, false)?;

    let pieces = partition(&projected, max_area)?;
    let (geometry, _) = project_geometry(&Geometry::MultiPolygon(pieces), crs, true)?;

    let Geometry::MultiPolygon(pieces) = geometry else {
        return Err(Error::InvalidInput(
            "partitioned region did not project back to a MultiPolygon".to_string(),
        ));
    };

    Ok(pieces
        .iter()
        .filter_map(|piece| piece.bounding_rect())
        .map(BoundingBox::from_rect)
        .collect())
}

/// Street network extractor bound to one Overpass instance and tag allow-list
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    client: OverpassClient,
    settings: Settings,
}

impl Extractor {
    /// Create an extractor with default settings (public Overpass instance)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with custom settings
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            client: OverpassClient::new(settings.overpass.clone()),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Overpass queries that [`Extractor::osm_net_download`] would send
    pub fn region_queries(
        &self,
        bbox: &BoundingBox,
        filter: &OsmFilter,
        options: &QueryOptions,
    ) -> Result<Vec<String>> {
        Ok(sub_regions(bbox, options.max_query_area_size)?
            .iter()
            .map(|region| build_query(region, filter, options.timeout, options.memory))
            .collect())
    }

    /// Send each query in turn and merge the responses
    pub async fn download_region_set(
        &self,
        queries: &[String],
        options: &QueryOptions,
    ) -> Result<Vec<Element>> {
        let total = queries.len();
        let mut responses = Vec::with_capacity(total);

        for (index, query) in queries.iter().enumerate() {
            debug!("Requesting sub-region {} of {total}", index + 1);
            let response = self
                .client
                .request(query, options.timeout, options.error_pause)
                .await?;
            responses.push(response);

            if let Some(ref progress) = options.progress {
                progress(index + 1, total);
            }
        }

        Ok(merge_elements(responses))
    }

    /// Download the merged, deduplicated elements inside a bounding box
    pub async fn osm_net_download(
        &self,
        bbox: &BoundingBox,
        filter: &OsmFilter,
        options: &QueryOptions,
    ) -> Result<Vec<Element>> {
        let queries = self.region_queries(bbox, filter, options)?;
        info!(
            "Requesting network data within bounding box from Overpass API in {} request(s)",
            queries.len()
        );

        let start_time = Instant::now();
        let elements = self.download_region_set(&queries, options).await?;
        info!(
            "Downloaded OSM network data within bounding box from Overpass API in {} request(s) and {:.2} seconds",
            queries.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(elements)
    }

    /// Download and parse node, way and way-node tables for a bounding box
    pub async fn ways_in_bbox(
        &self,
        bbox: &BoundingBox,
        filter: &OsmFilter,
        options: &QueryOptions,
    ) -> Result<OsmTables> {
        let elements = self.osm_net_download(bbox, filter, options).await?;
        parse_network_osm_query(&elements, &self.settings.keep_osm_tags)
    }

    /// Build the intersection graph of the street network in a bounding box
    pub async fn network_from_bbox(
        &self,
        bbox: &BboxSpec,
        filter: &OsmFilter,
        options: &QueryOptions,
    ) -> Result<Graph> {
        let start_time = Instant::now();
        let bbox = bbox.resolve()?;

        let tables = self.ways_in_bbox(&bbox, filter, options).await?;
        info!(
            "Returning OSM data with {} nodes and {} ways...",
            tables.nodes.len(),
            tables.ways.len()
        );

        let graph = graph::build(&tables, options.directed, &self.settings.keep_osm_tags)?;
        info!(
            "Completed OSM data download and graph node and edge table creation in {:.2} seconds",
            start_time.elapsed().as_secs_f64()
        );

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OverpassConfig;
    use crate::core::options::DEFAULT_MAX_QUERY_AREA_SIZE;
    use crate::core::query::NetworkType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn berkeley() -> BoundingBox {
        BoundingBox::new(-122.2762, 37.8211, -122.2547, 37.8309).unwrap()
    }

    fn extractor_for(server: &MockServer) -> Extractor {
        Extractor::with_settings(Settings {
            overpass: OverpassConfig::with_base_url(&server.uri()),
            ..Default::default()
        })
    }

    #[test]
    fn test_small_bbox_is_one_region() {
        let bbox = berkeley();
        let regions = sub_regions(&bbox, DEFAULT_MAX_QUERY_AREA_SIZE).unwrap();
        assert_eq!(regions.len(), 1);

        let region = regions[0];
        assert!((region.west - bbox.west).abs() < 1e-6);
        assert!((region.south - bbox.south).abs() < 1e-6);
        assert!((region.east - bbox.east).abs() < 1e-6);
        assert!((region.north - bbox.north).abs() < 1e-6);
    }

    #[test]
    fn test_large_bbox_is_split() {
        // roughly 1.9km x 1.1km, cut into 1km x 1km quadrats
        let bbox = berkeley();
        let regions = sub_regions(&bbox, 1_000_000.0).unwrap();
        assert!(regions.len() >= 4, "got {} regions", regions.len());
        for region in &regions {
            assert!(region.west >= bbox.west - 1e-6 && region.east <= bbox.east + 1e-6);
            assert!(region.south >= bbox.south - 1e-6 && region.north <= bbox.north + 1e-6);
        }
    }

    #[test]
    fn test_region_queries() {
        let options = QueryOptions {
            timeout: 60,
            memory: Some(1_073_741_824),
            ..Default::default()
        };
        let queries = Extractor::new()
            .region_queries(&berkeley(), &OsmFilter::Network(NetworkType::Drive), &options)
            .unwrap();

        assert_eq!(queries.len(), 1);
        assert!(queries[0].starts_with("[out:json][timeout:60][maxsize:1073741824];(way[\"highway\"]"));
        assert!(queries[0].ends_with(");>;);out;"));

        // (lat_min, lng_max, lat_max, lng_min) after the filter predicate
        let bounds = queries[0]
            .rsplit_once("](")
            .and_then(|(_, tail)| tail.split_once(')'))
            .map(|(bounds, _)| bounds)
            .unwrap();
        let values: Vec<f64> = bounds.split(',').map(|v| v.parse().unwrap()).collect();
        let expected = [37.8211, -122.2762, 37.8309, -122.2547];
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-6, "{bounds}");
        }
        assert_eq!(values.len(), 4);
    }

    #[tokio::test]
    async fn test_download_region_set_reports_progress_and_dedupes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .and(body_string_contains("first"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"elements": [
                    {"type": "node", "id": 1, "lat": 0.0, "lon": 0.0},
                    {"type": "node", "id": 2, "lat": 0.0, "lon": 0.001}
                ]}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .and(body_string_contains("second"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"elements": [
                    {"type": "node", "id": 2, "lat": 0.0, "lon": 0.001},
                    {"type": "way", "id": 9, "nodes": [1, 2]}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let options = QueryOptions {
            progress: Some(Arc::new(move |done: usize, total: usize| {
                assert_eq!(total, 2);
                seen.fetch_add(1, Ordering::SeqCst);
                assert_eq!(seen.load(Ordering::SeqCst), done);
            })),
            ..Default::default()
        };

        let elements = extractor_for(&server)
            .download_region_set(&["first".to_string(), "second".to_string()], &options)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let ids: Vec<Option<u64>> = elements.iter().map(Element::id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(9)]);
    }

    #[tokio::test]
    async fn test_network_from_bbox_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"elements": []}"#))
            .mount(&server)
            .await;

        let result = extractor_for(&server)
            .network_from_bbox(
                &BboxSpec::from_tuple((-122.2762, 37.8211, -122.2547, 37.8309)),
                &OsmFilter::default(),
                &QueryOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(Error::NoData(_))));
    }

    #[tokio::test]
    async fn test_network_from_bbox_rejects_bad_bounds_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let spec = BboxSpec {
            bbox: Some((-122.2762, 37.8211, -122.2547, 37.8309)),
            lat_min: Some(37.8211),
            ..Default::default()
        };
        let result = extractor_for(&server)
            .network_from_bbox(&spec, &OsmFilter::default(), &QueryOptions::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
