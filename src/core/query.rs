//! Bounding boxes, network filters and Overpass query strings
//!
//! Bounds follow the OSM convention used throughout butterfly-net: `lng_max`
//! is the western edge and `lng_min` the eastern edge, and the tuple form is
//! `(lng_max, lat_min, lng_min, lat_max)`, i.e. `(west, south, east, north)`.

use std::fmt;
use std::str::FromStr;

use geo::{polygon, Polygon, Rect};

use crate::core::error::{Error, Result};

/// Street network to request from Overpass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    /// Roads and paths that allow pedestrian access
    #[default]
    Walk,
    /// Roads drivable by ordinary passenger vehicles
    Drive,
}

impl NetworkType {
    /// Overpass filter predicate appended to `way["highway"]`
    pub fn osm_filter(self) -> &'static str {
        match self {
            NetworkType::Walk => {
                "[\"highway\"!~\"motor|proposed|construction|abandoned|platform|raceway\"]\
                 [\"foot\"!~\"no\"][\"pedestrians\"!~\"no\"]"
            }
            NetworkType::Drive => {
                "[\"highway\"!~\"cycleway|footway|path|pedestrian|steps|track|proposed\
                 |construction|bridleway|abandoned|platform|raceway|service\"]\
                 [\"motor_vehicle\"!~\"no\"][\"motorcar\"!~\"no\"]\
                 [\"service\"!~\"parking|parking_aisle|driveway|emergency_access\"]"
            }
        }
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "walk" => Ok(NetworkType::Walk),
            "drive" => Ok(NetworkType::Drive),
            other => Err(Error::unknown_network_type(other)),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::Walk => write!(f, "walk"),
            NetworkType::Drive => write!(f, "drive"),
        }
    }
}

/// Which ways to select: a predefined network or a raw Overpass predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsmFilter {
    Network(NetworkType),
    Custom(String),
}

impl Default for OsmFilter {
    fn default() -> Self {
        OsmFilter::Network(NetworkType::default())
    }
}

impl OsmFilter {
    /// A custom predicate, when given, replaces the network-type filter
    pub fn resolve(network_type: &str, custom_osm_filter: Option<&str>) -> Result<Self> {
        match custom_osm_filter {
            Some(filter) => Ok(OsmFilter::Custom(filter.to_string())),
            None => Ok(OsmFilter::Network(network_type.parse()?)),
        }
    }

    pub fn predicate(&self) -> &str {
        match self {
            OsmFilter::Network(network_type) => network_type.osm_filter(),
            OsmFilter::Custom(filter) => filter,
        }
    }
}

/// A validated WGS84 bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        for (name, value) in [("west", west), ("south", south), ("east", east), ("north", north)] {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "bounding box {name} bound must be a finite number, got {value}"
                )));
            }
        }
        if south > north {
            return Err(Error::InvalidInput(format!(
                "lat_min ({south}) must not exceed lat_max ({north})"
            )));
        }
        if west > east {
            return Err(Error::InvalidInput(format!(
                "western bound lng_max ({west}) must not exceed eastern bound lng_min ({east})"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Closed polygon tracing the box (x = longitude, y = latitude)
    pub fn to_polygon(&self) -> Polygon<f64> {
        polygon![
            (x: self.east, y: self.south),
            (x: self.west, y: self.south),
            (x: self.west, y: self.north),
            (x: self.east, y: self.north),
        ]
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            west: rect.min().x,
            south: rect.min().y,
            east: rect.max().x,
            north: rect.max().y,
        }
    }
}

impl FromStr for BoundingBox {
    type Err = Error;

    /// Parse the CSV form `west,south,east,north`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::InvalidInput(format!(
                "bbox must have 4 comma-separated values, got {}",
                parts.len()
            )));
        }
        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse::<f64>().map_err(|_| {
                Error::InvalidInput(format!("bbox value {part:?} is not a number"))
            })?;
        }
        BoundingBox::new(values[0], values[1], values[2], values[3])
    }
}

/// Caller-supplied bounds, either as four scalars or as a 4-tuple
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BboxSpec {
    pub lat_min: Option<f64>,
    pub lng_min: Option<f64>,
    pub lat_max: Option<f64>,
    pub lng_max: Option<f64>,
    /// `(lng_max, lat_min, lng_min, lat_max)`
    pub bbox: Option<(f64, f64, f64, f64)>,
}

impl BboxSpec {
    pub fn from_bounds(lat_min: f64, lng_min: f64, lat_max: f64, lng_max: f64) -> Self {
        Self {
            lat_min: Some(lat_min),
            lng_min: Some(lng_min),
            lat_max: Some(lat_max),
            lng_max: Some(lng_max),
            bbox: None,
        }
    }

    pub fn from_tuple(bbox: (f64, f64, f64, f64)) -> Self {
        Self {
            bbox: Some(bbox),
            ..Default::default()
        }
    }

    /// Validate the bounds and turn them into a bounding box
    pub fn resolve(&self) -> Result<BoundingBox> {
        let scalars = [self.lat_min, self.lng_min, self.lat_max, self.lng_max];

        let (lat_min, lng_min, lat_max, lng_max) = match self.bbox {
            Some((lng_max, lat_min, lng_min, lat_max)) => {
                if scalars.iter().any(Option::is_some) {
                    return Err(Error::InvalidInput(
                        "lat_min, lng_min, lat_max and lng_max must be None if you are using bbox"
                            .to_string(),
                    ));
                }
                (lat_min, lng_min, lat_max, lng_max)
            }
            None => (
                self.lat_min.ok_or_else(|| missing("lat_min"))?,
                self.lng_min.ok_or_else(|| missing("lng_min"))?,
                self.lat_max.ok_or_else(|| missing("lat_max"))?,
                self.lng_max.ok_or_else(|| missing("lng_max"))?,
            ),
        };

        BoundingBox::new(lng_max, lat_min, lng_min, lat_max)
    }
}

fn missing(name: &str) -> Error {
    Error::InvalidInput(format!("{name} cannot be None"))
}

/// Build the Overpass QL for one sub-region
///
/// Coordinates are rounded to 8 decimal places so identical regions always
/// produce identical query strings.
pub fn build_query(
    region: &BoundingBox,
    filter: &OsmFilter,
    timeout: u64,
    memory: Option<u64>,
) -> String {
    let maxsize = memory.map(|m| format!("[maxsize:{m}]")).unwrap_or_default();
    format!(
        "[out:json][timeout:{timeout}]{maxsize};(way[\"highway\"]{filters}({lat_min:.8},{lng_max:.8},{lat_max:.8},{lng_min:.8});>;);out;",
        filters = filter.predicate(),
        lat_min = region.south,
        lng_max = region.west,
        lat_max = region.north,
        lng_min = region.east,
    )
}
