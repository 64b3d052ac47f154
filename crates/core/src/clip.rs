//! Geometry clipping to a tile.
//!
//! [`clip_geometry`] is the entry point used by the feature layer: it checks
//! the geometry kind and coordinates, takes a bounding-box fast path when it
//! can, and otherwise hands each part to the line or polygon clipper.
//!
//! # Collapse rule
//!
//! The output kind follows the number of surviving parts rather than the
//! input kind: a `MultiLineString` with a single surviving fragment comes back
//! as a `LineString`, and a `LineString` cut into two fragments comes back as a
//! `MultiLineString`. Polygons behave the same way.

use geo::{
    BoundingRect, Coord, CoordsIter, Geometry, LineString, MultiLineString, MultiPolygon, Point,
    Polygon, Rect,
};

use crate::line::constrain_line;
use crate::polygon::clip_polygon;
use crate::tile::{crosses_antimeridian, Tile};
use crate::validate::{ring_problems, validate_coordinates};
use crate::{Error, Result};

/// Clip a geometry to a tile.
///
/// # Returns
///
/// `Ok(None)` when nothing of the geometry lies in the tile, otherwise the
/// clipped geometry in the tile's longitude frame.
///
/// # Errors
///
/// - [`Error::UnsupportedGeometry`] for anything other than points, lines,
///   polygons and their multi- variants
/// - [`Error::MalformedGeometry`] for non-finite coordinates
pub fn clip_geometry(tile: &Tile, geom: &Geometry<f64>) -> Result<Option<Geometry<f64>>> {
    let kind = geometry_kind(geom);
    if !matches!(
        geom,
        Geometry::Point(_)
            | Geometry::LineString(_)
            | Geometry::MultiLineString(_)
            | Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
    ) {
        return Err(Error::UnsupportedGeometry(kind.to_string()));
    }

    validate_coordinates(geom)?;

    // Quadratic in ring size
    if log::log_enabled!(log::Level::Trace) {
        let problems = ring_problems(geom);
        if !problems.is_empty() {
            log::trace!("Clipping {} with invalid rings: {:?}", kind, problems);
        }
    }

    if let Some(shortcut) = fast_path(tile, geom) {
        log::trace!(
            "{} {} by bounding box",
            kind,
            if shortcut.is_some() { "accepted" } else { "rejected" }
        );
        return Ok(shortcut);
    }

    let clipped = match geom {
        Geometry::Point(p) => clip_point(tile, p).map(Geometry::Point),
        Geometry::LineString(ls) => collapse_lines(constrain_line(tile, &ls.0)),
        Geometry::MultiLineString(mls) => collapse_lines(
            mls.0
                .iter()
                .flat_map(|ls| constrain_line(tile, &ls.0))
                .collect(),
        ),
        Geometry::Polygon(poly) => collapse_polygons(clip_polygon(tile, poly)),
        Geometry::MultiPolygon(mp) => collapse_polygons(
            mp.0
                .iter()
                .flat_map(|poly| clip_polygon(tile, poly))
                .collect(),
        ),
        _ => None,
    };

    Ok(clipped)
}

/// The GeoJSON name of a geometry's kind.
pub fn geometry_kind(geom: &Geometry<f64>) -> &'static str {
    match geom {
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

/// Decide a geometry from its bounding box alone.
///
/// Returns `Some(None)` when the box misses the tile, `Some(Some(copy))` when
/// the box lies strictly inside it and `None` when the geometry must be
/// clipped. Only plain `[-180, 180]` windows and geometry that stays on one
/// side of the antimeridian qualify, since the box is computed on raw
/// longitudes.
fn fast_path(tile: &Tile, geom: &Geometry<f64>) -> Option<Option<Geometry<f64>>> {
    if !tile.is_within_world() || spans_antimeridian(geom) {
        return None;
    }
    let bbox = geom.bounding_rect()?;

    if is_disjoint(&bbox, tile) {
        Some(None)
    } else if is_strictly_inside(&bbox, tile) {
        Some(Some(geom.clone()))
    } else {
        None
    }
}

/// True when the geometry leaves `[-180, 180]` or has an edge crossing the
/// antimeridian.
pub(crate) fn spans_antimeridian(geom: &Geometry<f64>) -> bool {
    let coords: Vec<Coord<f64>> = geom.coords_iter().collect();
    coords.iter().any(|c| !(-180.0..=180.0).contains(&c.x))
        || coords.windows(2).any(|w| crosses_antimeridian(w[0], w[1]))
        || match geom {
            // Ring closing edges are not consecutive in the coordinate stream
            Geometry::Polygon(poly) => rings_cross(poly),
            Geometry::MultiPolygon(mp) => mp.0.iter().any(rings_cross),
            _ => false,
        }
}

fn rings_cross(poly: &Polygon<f64>) -> bool {
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .filter_map(|ring| Some((*ring.0.first()?, *ring.0.last()?)))
        .any(|(first, last)| crosses_antimeridian(last, first))
}

fn is_disjoint(bbox: &Rect<f64>, tile: &Tile) -> bool {
    bbox.max().x < tile.west()
        || bbox.min().x > tile.east()
        || bbox.max().y < tile.south()
        || bbox.min().y > tile.north()
}

fn is_strictly_inside(bbox: &Rect<f64>, tile: &Tile) -> bool {
    bbox.min().x > tile.west()
        && bbox.max().x < tile.east()
        && bbox.min().y > tile.south()
        && bbox.max().y < tile.north()
}

fn clip_point(tile: &Tile, point: &Point<f64>) -> Option<Point<f64>> {
    if tile.contains(point.0) {
        let lon = tile.half_open_lon(point.x());
        Some(Point::new(lon, point.y()))
    } else {
        None
    }
}

fn collapse_lines(mut fragments: Vec<LineString<f64>>) -> Option<Geometry<f64>> {
    match fragments.len() {
        0 => None,
        1 => fragments.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(MultiLineString::new(fragments))),
    }
}

fn collapse_polygons(mut polygons: Vec<Polygon<f64>>) -> Option<Geometry<f64>> {
    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}
