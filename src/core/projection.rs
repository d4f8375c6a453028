//! WGS84 <-> UTM projection
//!
//! Sub-region partitioning works in meters, so the query polygon is projected
//! to the UTM zone of its centroid first and projected back afterwards.
//! Transverse Mercator series on the WGS84 ellipsoid (Snyder, USGS PP 1395).

use geo::{Centroid, Coord, Geometry, MapCoords};
use log::debug;

use crate::core::error::{Error, Result};

const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Coordinate reference system of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// Longitude/latitude degrees (EPSG:4326)
    Wgs84,
    /// UTM zone 1..=60, northern or southern hemisphere
    Utm { zone: u8, north: bool },
}

impl Crs {
    /// EPSG code (4326, 326zz or 327zz)
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Utm { zone, north: true } => 32600 + *zone as u32,
            Crs::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }
}

fn utm_zone(lon: f64, lat: f64) -> (u8, bool) {
    let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
    (zone, lat >= 0.0)
}

fn eccentricity_squared() -> f64 {
    F * (2.0 - F)
}

fn central_meridian(zone: u8) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

fn meridian_arc(phi: f64) -> f64 {
    let e2 = eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Project a WGS84 (lon, lat) coordinate into UTM (easting, northing)
pub fn wgs84_to_utm(coord: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let e2 = eccentricity_squared();
    let ep2 = e2 / (1.0 - e2);

    let phi = coord.y.to_radians();
    let lambda = coord.x.to_radians();

    let n = A / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * phi.cos().powi(2);
    let a = phi.cos() * (lambda - central_meridian(zone));
    let m = meridian_arc(phi);

    let x = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;
    let mut y = K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if !north {
        y += FALSE_NORTHING_SOUTH;
    }

    Coord { x, y }
}

/// Inverse of [`wgs84_to_utm`]
pub fn utm_to_wgs84(coord: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let e2 = eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let northing = if north {
        coord.y
    } else {
        coord.y - FALSE_NORTHING_SOUTH
    };

    let m = northing / K0;
    let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let c1 = ep2 * phi1.cos().powi(2);
    let t1 = phi1.tan().powi(2);
    let n1 = A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = (coord.x - FALSE_EASTING) / (n1 * K0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lambda = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / phi1.cos();

    Coord {
        x: lambda.to_degrees(),
        y: phi.to_degrees(),
    }
}

/// Project a geometry between WGS84 and its local UTM zone
///
/// With `to_latlong == false` the geometry is projected from WGS84 to the UTM
/// zone of its centroid (a geometry already in UTM is returned unchanged).
/// With `to_latlong == true` it is projected from `crs` back to WGS84.
pub fn project_geometry(
    geometry: &Geometry<f64>,
    crs: Crs,
    to_latlong: bool,
) -> Result<(Geometry<f64>, Crs)> {
    match (crs, to_latlong) {
        (Crs::Wgs84, true) => Ok((geometry.clone(), Crs::Wgs84)),
        (Crs::Utm { zone, north }, true) => Ok((
            geometry.map_coords(move |c| utm_to_wgs84(c, zone, north)),
            Crs::Wgs84,
        )),
        (Crs::Utm { .. }, false) => Ok((geometry.clone(), crs)),
        (Crs::Wgs84, false) => {
            let centroid = geometry.centroid().ok_or_else(|| {
                Error::InvalidInput("cannot project an empty geometry".to_string())
            })?;
            let (zone, north) = utm_zone(centroid.x(), centroid.y());
            let target = Crs::Utm { zone, north };
            debug!("Projecting to EPSG:{}", target.epsg());
            Ok((geometry.map_coords(move |c| wgs84_to_utm(c, zone, north)), target))
        }
    }
}
