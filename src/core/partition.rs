//! Splitting an oversized query region into Overpass-sized sub-regions
//!
//! The region is consolidated into one convex polygon, then cut along a
//! quadrat grid whose lines are thickened by `quadrat_width * buffer_amount`.
//! Every cut therefore leaves a hairline gap, and no two pieces share an edge.

use geo::{Area, BoundingRect, ConvexHull, Coord, Geometry, LineString, MultiPolygon, Polygon, Rect};

use crate::core::error::{Error, Result};

/// Minimum number of grid lines per axis (a 2x2 grid at least)
pub const DEFAULT_MIN_NUM: usize = 3;

/// Grid line half-width as a fraction of the quadrat width
pub const DEFAULT_BUFFER_AMOUNT: f64 = 1e-9;

/// Partition `geometry` into pieces of at most `max_area` each
///
/// A multi-part geometry, or a polygon larger than `max_area`, is replaced by
/// its convex hull first. The result is always a multi-polygon, even when no
/// cut was needed.
pub fn partition(geometry: &Geometry<f64>, max_area: f64) -> Result<MultiPolygon<f64>> {
    if !max_area.is_finite() || max_area <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "max_query_area_size must be a positive number, got {max_area}"
        )));
    }

    let consolidated = match geometry {
        Geometry::Polygon(polygon) if polygon.unsigned_area() <= max_area => polygon.clone(),
        Geometry::Polygon(polygon) => polygon.convex_hull(),
        Geometry::MultiPolygon(multi) if multi.0.is_empty() => {
            return Err(Error::InvalidInput("cannot partition an empty MultiPolygon".to_string()));
        }
        Geometry::MultiPolygon(multi) => multi.convex_hull(),
        other => {
            return Err(Error::InvalidInput(format!(
                "Geometry must be a Polygon or MultiPolygon, got {}",
                geometry_kind(other)
            )));
        }
    };

    if consolidated.unsigned_area() > max_area {
        let quadrat_width = max_area.sqrt();
        return quadrat_cut_geometry(
            &Geometry::Polygon(consolidated),
            quadrat_width,
            DEFAULT_MIN_NUM,
            DEFAULT_BUFFER_AMOUNT,
        );
    }

    Ok(MultiPolygon::new(vec![consolidated]))
}

/// Cut a polygon or multi-polygon along a grid of buffered quadrat lines
///
/// Grid lines are spaced evenly across the bounding box, with
/// `ceil(span / quadrat_width) + 1` lines per axis but never fewer than
/// `min_num`. Pieces come out column by column, west to east, each column
/// south to north.
pub fn quadrat_cut_geometry(
    geometry: &Geometry<f64>,
    quadrat_width: f64,
    min_num: usize,
    buffer_amount: f64,
) -> Result<MultiPolygon<f64>> {
    if !quadrat_width.is_finite() || quadrat_width <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "quadrat_width must be a positive number, got {quadrat_width}"
        )));
    }

    let polygons: Vec<&Polygon<f64>> = match geometry {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(multi) => multi.0.iter().collect(),
        other => {
            return Err(Error::InvalidInput(format!(
                "Geometry must be a Polygon or MultiPolygon, got {}",
                geometry_kind(other)
            )));
        }
    };

    let bounds = geometry
        .bounding_rect()
        .ok_or_else(|| Error::InvalidInput("cannot cut an empty geometry".to_string()))?;

    let x_num = ((bounds.width() / quadrat_width).ceil() as usize + 1).max(min_num);
    let y_num = ((bounds.height() / quadrat_width).ceil() as usize + 1).max(min_num);
    let x_points = linspace(bounds.min().x, bounds.max().x, x_num);
    let y_points = linspace(bounds.min().y, bounds.max().y, y_num);

    let buffer_size = quadrat_width * buffer_amount;
    let mut pieces = Vec::new();

    for xs in x_points.windows(2) {
        for ys in y_points.windows(2) {
            let (min_x, max_x) = (xs[0] + buffer_size, xs[1] - buffer_size);
            let (min_y, max_y) = (ys[0] + buffer_size, ys[1] - buffer_size);
            if min_x >= max_x || min_y >= max_y {
                continue;
            }
            let cell = Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y });

            for polygon in &polygons {
                if let Some(piece) = clip_polygon(polygon, &cell) {
                    pieces.push(piece);
                }
            }
        }
    }

    Ok(MultiPolygon::new(pieces))
}

/// `num` evenly spaced values from `start` to `stop` inclusive
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Clip a polygon to an axis-aligned cell; `None` when nothing is left
fn clip_polygon(polygon: &Polygon<f64>, cell: &Rect<f64>) -> Option<Polygon<f64>> {
    let exterior = clip_ring(polygon.exterior(), cell)?;
    let interiors = polygon
        .interiors()
        .iter()
        .filter_map(|ring| clip_ring(ring, cell))
        .collect();

    let piece = Polygon::new(exterior, interiors);
    (piece.unsigned_area() > 0.0).then_some(piece)
}

#[derive(Clone, Copy)]
enum ClipEdge {
    Left(f64),
    Right(f64),
    Bottom(f64),
    Top(f64),
}

impl ClipEdge {
    fn inside(self, p: Coord<f64>) -> bool {
        match self {
            ClipEdge::Left(x) => p.x >= x,
            ClipEdge::Right(x) => p.x <= x,
            ClipEdge::Bottom(y) => p.y >= y,
            ClipEdge::Top(y) => p.y <= y,
        }
    }

    /// Crossing of segment `a`-`b` with this edge; only called when exactly
    /// one endpoint is inside, so the denominator is never zero
    fn intersect(self, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
        match self {
            ClipEdge::Left(x) | ClipEdge::Right(x) => {
                let t = (x - a.x) / (b.x - a.x);
                Coord { x, y: a.y + t * (b.y - a.y) }
            }
            ClipEdge::Bottom(y) | ClipEdge::Top(y) => {
                let t = (y - a.y) / (b.y - a.y);
                Coord { x: a.x + t * (b.x - a.x), y }
            }
        }
    }
}

/// Sutherland-Hodgman clipping of one ring against the cell
fn clip_ring(ring: &LineString<f64>, cell: &Rect<f64>) -> Option<LineString<f64>> {
    let mut points: Vec<Coord<f64>> = ring.0.clone();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    let edges = [
        ClipEdge::Left(cell.min().x),
        ClipEdge::Right(cell.max().x),
        ClipEdge::Bottom(cell.min().y),
        ClipEdge::Top(cell.max().y),
    ];

    for edge in edges {
        if points.is_empty() {
            return None;
        }
        let input = std::mem::take(&mut points);
        let mut previous = input[input.len() - 1];
        for &current in &input {
            match (edge.inside(previous), edge.inside(current)) {
                (true, true) => points.push(current),
                (true, false) => points.push(edge.intersect(previous, current)),
                (false, true) => {
                    points.push(edge.intersect(previous, current));
                    points.push(current);
                }
                (false, false) => {}
            }
            previous = current;
        }
    }

    points.dedup();
    (points.len() >= 3).then(|| LineString::new(points))
}
