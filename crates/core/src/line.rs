//! Clipping open polylines to a tile.
//!
//! The polyline is walked one segment at a time. Each segment is classified by
//! whether its endpoints fall inside the tile (boundary included) and the
//! tile's edge finder supplies the entry and exit points where it crosses in
//! or out:
//!
//! - inside to inside extends the open fragment
//! - inside to outside ends it at the exit point
//! - outside to inside starts a new fragment at the entry point
//! - outside to outside yields a standalone two-point fragment when the
//!   segment cuts across the tile

use geo::{Coord, LineString};

use crate::tile::Tile;

/// Clip a polyline to a tile.
///
/// Returns the fragments of `coords` that lie inside the tile's closed
/// region, in traversal order. Fragments that collapse to a single point are
/// dropped, so an empty `Vec` means nothing survives. Output points are in the
/// tile's longitude frame.
pub fn constrain_line(tile: &Tile, coords: &[Coord<f64>]) -> Vec<LineString<f64>> {
    let mut fragments = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();

    for pair in coords.windows(2) {
        let (a, b) = tile.normalize_segment(pair[0], pair[1]);

        let Some(clip) = tile.clip_segment(a, b) else {
            finish(&mut fragments, &mut current);
            continue;
        };

        if clip.enters {
            finish(&mut fragments, &mut current);
            if clip.exits {
                log::trace!(
                    "segment passes through tile without a vertex inside: {:?} -> {:?}",
                    clip.start,
                    clip.end
                );
            }
        }
        if current.is_empty() {
            current.push(clip.start);
        }
        push_distinct(&mut current, clip.end);

        if clip.exits {
            finish(&mut fragments, &mut current);
        }
    }

    finish(&mut fragments, &mut current);
    fragments
}

fn push_distinct(coords: &mut Vec<Coord<f64>>, point: Coord<f64>) {
    if coords.last() != Some(&point) {
        coords.push(point);
    }
}

fn finish(fragments: &mut Vec<LineString<f64>>, current: &mut Vec<Coord<f64>>) {
    if current.len() >= 2 {
        fragments.push(LineString::new(std::mem::take(current)));
    } else {
        current.clear();
    }
}
