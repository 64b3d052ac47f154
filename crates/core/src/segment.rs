//! Straight segments between two geographic points.
//!
//! A [`Segment`] answers the two questions the tile edge finder needs: where
//! does the segment cross a given parallel (`x_at`) and where does it cross a
//! given meridian (`y_at`). Both queries are restricted to the segment's own
//! span, so a `None` means "no crossing on this segment".

use geo::Coord;

/// A directed segment from `a` to `b` in lon/lat space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: Coord<f64>,
    pub b: Coord<f64>,
    /// Longitude delta `b.x - a.x`
    pub dx: f64,
    /// Latitude delta `b.y - a.y`
    pub dy: f64,
}

impl Segment {
    pub fn new(a: Coord<f64>, b: Coord<f64>) -> Self {
        Self {
            a,
            b,
            dx: b.x - a.x,
            dy: b.y - a.y,
        }
    }

    /// True when both endpoints coincide.
    pub fn is_degenerate(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    /// Longitude at which the segment crosses latitude `lat`.
    ///
    /// Returns `None` for horizontal (or zero-length) segments and when `lat`
    /// lies outside the segment's latitude span.
    pub fn x_at(&self, lat: f64) -> Option<f64> {
        if self.dy == 0.0 || !within(lat, self.a.y, self.b.y) {
            return None;
        }

        // Endpoints are answered exactly so crossings at vertices stay on the vertex
        if lat == self.a.y {
            return Some(self.a.x);
        }
        if lat == self.b.y {
            return Some(self.b.x);
        }

        Some(self.a.x + self.dx * (lat - self.a.y) / self.dy)
    }

    /// Latitude at which the segment crosses longitude `lon`.
    ///
    /// Returns `None` for vertical (or zero-length) segments and when `lon`
    /// lies outside the segment's longitude span.
    pub fn y_at(&self, lon: f64) -> Option<f64> {
        if self.dx == 0.0 || !within(lon, self.a.x, self.b.x) {
            return None;
        }

        if lon == self.a.x {
            return Some(self.a.y);
        }
        if lon == self.b.x {
            return Some(self.b.y);
        }

        Some(self.a.y + self.dy * (lon - self.a.x) / self.dx)
    }
}

/// Inclusive range check that does not care about the order of the bounds.
fn within(value: f64, p: f64, q: f64) -> bool {
    value >= p.min(q) && value <= p.max(q)
}
