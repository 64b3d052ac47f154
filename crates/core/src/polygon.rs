//! Clipping polygon rings to a tile.
//!
//! This is the line clipper extended to close rings against the tile
//! boundary, in the manner of Weiler–Atherton specialised to a rectangle:
//!
//! 1. Walk the ring from a vertex outside the tile and collect *pieces*, the
//!    runs of ring material inside the tile. Every piece starts where the ring
//!    enters the tile and ends where it leaves.
//! 2. Link the pieces by following the tile boundary from each exit to the
//!    next entry, in the ring's own winding direction, picking up the tile
//!    corners passed on the way.
//!
//! Each closed chain of pieces is one output ring, so a ring whose inside
//! material is disconnected by the tile comes back as several rings. Output
//! rings keep the winding of the input.

use geo::{coord, Area, Contains, Coord, Intersects, LineString, Polygon};

use crate::tile::{crosses_antimeridian, Tile};

/// Clip a single closed ring to a tile.
///
/// Returns the closed rings whose union is the intersection of the ring's
/// interior with the tile. The result is empty when nothing survives.
pub fn constrain_polygon(tile: &Tile, ring: &LineString<f64>) -> Vec<LineString<f64>> {
    clip_rings(tile, ring, &[])
        .into_iter()
        .map(|polygon| polygon.into_inner().0)
        .collect()
}

/// Clip a polygon, holes included, to a tile.
///
/// Holes crossing the tile boundary are cut into the surrounding output ring;
/// holes entirely inside the tile are kept as interiors of the output ring
/// that contains them. Holes are re-oriented opposite to the exterior first.
pub fn clip_polygon(tile: &Tile, polygon: &Polygon<f64>) -> Vec<Polygon<f64>> {
    clip_rings(tile, polygon.exterior(), polygon.interiors())
}

fn clip_rings(tile: &Tile, exterior: &LineString<f64>, holes: &[LineString<f64>]) -> Vec<Polygon<f64>> {
    let Some(shell) = Ring::new(exterior) else {
        return Vec::new();
    };
    let ccw = shell.signed_area() > 0.0;

    let mut shells = Vec::new();
    let mut pieces = Vec::new();
    match shell.trace(tile) {
        Trace::Inside(ring) => shells.push(ring),
        Trace::Outside => {
            if !shell.surrounds(tile) {
                return Vec::new();
            }
        }
        Trace::Crossing(found) => pieces = found,
    }

    let mut enclosed_holes = Vec::new();
    for hole in holes {
        let Some(mut hole) = Ring::new(hole) else {
            continue;
        };
        if (hole.signed_area() > 0.0) == ccw {
            hole.reverse();
        }

        match hole.trace(tile) {
            Trace::Inside(ring) => enclosed_holes.push(ring),
            Trace::Outside => {
                if hole.surrounds(tile) {
                    return Vec::new();
                }
            }
            Trace::Crossing(found) => pieces.extend(found),
        }
    }

    if shells.is_empty() {
        shells = if pieces.is_empty() {
            // The tile sits inside the ring without touching it
            vec![tile.outline(ccw)]
        } else {
            link_pieces(tile, &pieces, ccw)
        };
    } else if !pieces.is_empty() {
        log::trace!(
            "ignoring {} hole pieces of a ring lying inside the tile",
            pieces.len()
        );
    }

    let outlines: Vec<Polygon<f64>> = shells
        .into_iter()
        .map(|ring| Polygon::new(LineString::new(ring), vec![]))
        .filter(|outline| outline.exterior().0.len() >= 4 && outline.signed_area() != 0.0)
        .collect();

    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outlines.len()];
    for hole in enclosed_holes {
        let Some(&first) = hole.first() else {
            continue;
        };
        if let Some(owner) = outlines.iter().position(|outline| outline.intersects(&first)) {
            interiors[owner].push(LineString::new(hole));
        }
    }

    outlines
        .into_iter()
        .zip(interiors)
        .map(|(outline, holes)| Polygon::new(outline.into_inner().0, holes))
        .collect()
}

/// How a ring meets the tile.
enum Trace {
    /// Every vertex is inside the tile; carries the closed ring in the tile's frame.
    Inside(Vec<Coord<f64>>),
    /// The ring never enters the tile.
    Outside,
    /// The ring crosses the tile boundary.
    Crossing(Vec<Piece>),
}

/// A run of ring material inside the tile, from an entry to an exit.
#[derive(Debug)]
struct Piece {
    coords: Vec<Coord<f64>>,
    /// Perimeter position of the first point
    entry: f64,
    /// Perimeter position of the last point
    exit: f64,
}

impl Piece {
    fn new(tile: &Tile, coords: Vec<Coord<f64>>) -> Option<Self> {
        // A single point means the ring only touches the boundary
        if coords.len() < 2 {
            return None;
        }
        let entry = tile.perimeter_position(*coords.first()?);
        let exit = tile.perimeter_position(*coords.last()?);
        Some(Self {
            coords,
            entry,
            exit,
        })
    }
}

/// An open ring without its closing point or repeated vertices.
struct Ring {
    coords: Vec<Coord<f64>>,
    /// `coords` with longitudes made continuous across the antimeridian
    unwrapped: Vec<Coord<f64>>,
}

impl Ring {
    fn new(ring: &LineString<f64>) -> Option<Self> {
        let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
        for &c in &ring.0 {
            push_distinct(&mut coords, c);
        }
        while coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        if coords.len() < 3 {
            return None;
        }

        let unwrapped = unwrap_longitudes(&coords);
        Some(Self { coords, unwrapped })
    }

    fn outline(&self) -> Polygon<f64> {
        Polygon::new(LineString::new(self.unwrapped.clone()), vec![])
    }

    /// Positive for counter-clockwise rings.
    fn signed_area(&self) -> f64 {
        self.outline().signed_area()
    }

    fn reverse(&mut self) {
        self.coords.reverse();
        self.unwrapped.reverse();
    }

    /// True when the tile centre lies strictly inside the ring.
    fn surrounds(&self, tile: &Tile) -> bool {
        let outline = self.outline();
        [-360.0, 0.0, 360.0].iter().any(|shift| {
            outline.contains(&coord! { x: tile.center_lon() + shift, y: tile.center_lat() })
        })
    }

    fn trace(&self, tile: &Tile) -> Trace {
        let n = self.coords.len();

        // Starting outside means no piece wraps around the end of the ring
        let Some(start) = self.coords.iter().position(|&c| !tile.covers(c)) else {
            let mut ring: Vec<Coord<f64>> = self.coords.iter().map(|&c| tile.wrap(c)).collect();
            ring.push(ring[0]);
            return Trace::Inside(ring);
        };

        let mut pieces = Vec::new();
        let mut current: Option<Vec<Coord<f64>>> = None;

        for k in 0..n {
            let i = (start + k) % n;
            let (a, b) = tile.normalize_segment(self.coords[i], self.coords[(i + 1) % n]);
            let Some(clip) = tile.clip_segment(a, b) else {
                continue;
            };

            if clip.enters || current.is_none() {
                if let Some(open) = current.take() {
                    log::trace!("closing piece that never left the tile");
                    pieces.extend(Piece::new(tile, open));
                }
                current = Some(vec![clip.start]);
            }
            if let Some(run) = current.as_mut() {
                push_distinct(run, clip.end);
            }
            if clip.exits {
                if let Some(run) = current.take() {
                    pieces.extend(Piece::new(tile, run));
                }
            }
        }

        if let Some(open) = current {
            log::trace!("closing piece left open at the end of the ring");
            pieces.extend(Piece::new(tile, open));
        }

        if pieces.is_empty() {
            Trace::Outside
        } else {
            Trace::Crossing(pieces)
        }
    }
}

/// Join pieces into closed rings by walking the tile boundary from each exit
/// to the nearest entry in the winding direction.
fn link_pieces(tile: &Tile, pieces: &[Piece], ccw: bool) -> Vec<Vec<Coord<f64>>> {
    let perimeter = tile.perimeter();
    let corners = tile.corners();
    let corner_positions = tile.corner_positions();

    let forward = |from: f64, to: f64| {
        if ccw {
            (to - from).rem_euclid(perimeter)
        } else {
            (from - to).rem_euclid(perimeter)
        }
    };

    let mut used = vec![false; pieces.len()];
    let mut rings = Vec::new();

    for first in 0..pieces.len() {
        if used[first] {
            continue;
        }

        let mut ring = Vec::new();
        let mut current = first;
        loop {
            used[current] = true;
            let piece = &pieces[current];
            for &c in &piece.coords {
                push_distinct(&mut ring, c);
            }

            let (next, gap) = pieces
                .iter()
                .enumerate()
                .filter(|&(i, _)| i == first || !used[i])
                .map(|(i, candidate)| (i, forward(piece.exit, candidate.entry)))
                .min_by(|x, y| x.1.total_cmp(&y.1))
                .unwrap_or((first, forward(piece.exit, pieces[first].entry)));

            let mut passed: Vec<(f64, Coord<f64>)> = corner_positions
                .iter()
                .zip(corners)
                .map(|(&position, corner)| (forward(piece.exit, position), corner))
                .filter(|&(distance, _)| distance > 0.0 && distance < gap)
                .collect();
            passed.sort_by(|x, y| x.0.total_cmp(&y.0));
            for (_, corner) in passed {
                push_distinct(&mut ring, corner);
            }

            if next == first {
                break;
            }
            current = next;
        }

        if let Some(&start) = ring.first() {
            push_distinct(&mut ring, start);
        }
        rings.push(ring);
    }

    rings
}

/// Make longitudes continuous along a ring, shifting by ±360 each time an
/// edge takes the short way across the antimeridian.
fn unwrap_longitudes(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut offset = 0.0;
    let mut unwrapped = Vec::with_capacity(coords.len());

    for (i, &c) in coords.iter().enumerate() {
        if i > 0 {
            let prev = coords[i - 1];
            if crosses_antimeridian(prev, c) {
                offset += if prev.x > 0.0 { 360.0 } else { -360.0 };
            }
        }
        unwrapped.push(coord! { x: c.x + offset, y: c.y });
    }

    unwrapped
}

fn push_distinct(coords: &mut Vec<Coord<f64>>, point: Coord<f64>) {
    if coords.last() != Some(&point) {
        coords.push(point);
    }
}
