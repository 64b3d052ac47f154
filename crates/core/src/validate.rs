//! Coordinate validation before clipping.
//!
//! The clippers assume every coordinate is a finite number. NaN makes every
//! comparison false, which would silently classify points as outside, and
//! infinities break the interpolation in [`crate::segment::Segment`]. Input
//! is therefore checked once up front and rejected rather than repaired.
//!
//! Self-intersecting rings are accepted. The polygon clipper still returns a
//! deterministic result for them, but its shape is unspecified, so
//! [`ring_problems`] exists to report them in the logs.
//!
//! # Usage
//!
//! ```
//! use geotile_core::validate::validate_coordinates;
//! use geo::{Geometry, LineString, Coord};
//!
//! let line = LineString::new(vec![
//!     Coord { x: 0.0, y: 0.0 },
//!     Coord { x: f64::NAN, y: 1.0 },
//! ]);
//! assert!(validate_coordinates(&Geometry::LineString(line)).is_err());
//! ```

use geo::{
    line_intersection::{line_intersection, LineIntersection},
    CoordsIter, Geometry, Line, LineString, Polygon,
};

use crate::{Error, Result};

/// Problems found in a geometry's coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    /// Longitude or latitude is NaN or infinite
    NonFinite { index: usize, x: f64, y: f64 },
    /// Latitude beyond the poles
    LatitudeOutOfRange { index: usize, y: f64 },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::NonFinite { index, x, y } => {
                write!(f, "coordinate {} is not finite ({}, {})", index, x, y)
            }
            InvalidReason::LatitudeOutOfRange { index, y } => {
                write!(f, "coordinate {} has latitude {} outside [-90, 90]", index, y)
            }
        }
    }
}

/// Collect every coordinate problem in `geom`, in coordinate order.
///
/// Longitudes are unbounded, so only latitude has a range check.
pub fn find_invalid_coordinates(geom: &Geometry<f64>) -> Vec<InvalidReason> {
    geom.coords_iter()
        .enumerate()
        .filter_map(|(index, c)| {
            if !c.x.is_finite() || !c.y.is_finite() {
                Some(InvalidReason::NonFinite { index, x: c.x, y: c.y })
            } else if !(-90.0..=90.0).contains(&c.y) {
                Some(InvalidReason::LatitudeOutOfRange { index, y: c.y })
            } else {
                None
            }
        })
        .collect()
}

/// Reject geometry the clippers cannot process.
///
/// Returns [`Error::MalformedGeometry`] describing the first problem found.
pub fn validate_coordinates(geom: &Geometry<f64>) -> Result<()> {
    match find_invalid_coordinates(geom).first() {
        Some(reason) => Err(Error::MalformedGeometry(reason.to_string())),
        None => Ok(()),
    }
}

/// Describe structural problems in the rings of a polygonal geometry.
///
/// Non-polygonal geometry has no rings and always yields an empty list.
pub fn ring_problems(geom: &Geometry<f64>) -> Vec<String> {
    match geom {
        Geometry::Polygon(poly) => polygon_problems(poly),
        Geometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .enumerate()
            .flat_map(|(i, poly)| {
                polygon_problems(poly)
                    .into_iter()
                    .map(move |problem| format!("polygon {}: {}", i, problem))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn polygon_problems(poly: &Polygon<f64>) -> Vec<String> {
    let mut problems = Vec::new();
    if has_self_intersection(poly.exterior()) {
        problems.push("exterior ring intersects itself".to_string());
    }
    for (i, hole) in poly.interiors().iter().enumerate() {
        if has_self_intersection(hole) {
            problems.push(format!("hole {} intersects itself", i));
        }
    }
    problems
}

/// True when two non-adjacent edges of a ring cross or overlap.
fn has_self_intersection(ring: &LineString<f64>) -> bool {
    let edges: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = edges.len();

    for i in 0..n {
        for j in (i + 2)..n {
            // First and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            match line_intersection(edges[i], edges[j]) {
                Some(LineIntersection::SinglePoint { is_proper, .. }) if is_proper => return true,
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    let on_i = intersection == edges[i].start || intersection == edges[i].end;
                    let on_j = intersection == edges[j].start || intersection == edges[j].end;
                    if !(on_i && on_j) {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => return true,
                None => {}
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    #[test]
    fn test_valid_geometry_passes() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)]),
            vec![],
        );
        assert!(validate_coordinates(&Geometry::Polygon(poly)).is_ok());
    }

    #[test]
    fn test_longitude_is_unbounded() {
        let geom = Geometry::Point(point! { x: 540.0, y: 45.0 });
        assert!(find_invalid_coordinates(&geom).is_empty());
    }

    #[test]
    fn test_nan_is_reported_with_index() {
        let line = LineString::new(vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 2.0, y: f64::NAN },
        ]);
        let problems = find_invalid_coordinates(&Geometry::LineString(line));
        assert_eq!(problems.len(), 1);
        assert!(matches!(problems[0], InvalidReason::NonFinite { index: 2, .. }));
    }

    #[test]
    fn test_infinite_and_polar_values() {
        let line = LineString::new(vec![
            coord! { x: f64::INFINITY, y: 0.0 },
            coord! { x: 1.0, y: 91.0 },
        ]);
        let problems = find_invalid_coordinates(&Geometry::LineString(line));
        assert_eq!(problems.len(), 2);
        assert!(matches!(problems[1], InvalidReason::LatitudeOutOfRange { index: 1, .. }));
    }

    #[test]
    fn test_bowtie_is_reported() {
        let bowtie = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)]),
            vec![],
        );
        let problems = ring_problems(&Geometry::Polygon(bowtie));
        assert_eq!(problems, vec!["exterior ring intersects itself".to_string()]);
    }

    #[test]
    fn test_simple_ring_has_no_problems() {
        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
            vec![],
        );
        assert!(ring_problems(&Geometry::Polygon(square)).is_empty());
        assert!(ring_problems(&Geometry::Point(point! { x: 0.0, y: 0.0 })).is_empty());
    }

    #[test]
    fn test_error_variant() {
        let geom = Geometry::Point(point! { x: f64::NAN, y: 0.0 });
        let err = validate_coordinates(&geom).unwrap_err();
        assert!(matches!(err, Error::MalformedGeometry(msg) if msg.contains("not finite")));
    }
}
