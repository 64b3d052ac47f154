//! Tile windows and tile grid math.
//!
//! A [`Tile`] is an axis-aligned lon/lat rectangle that geometry gets clipped
//! against. It knows how to test point containment and where an arbitrary
//! segment crosses its four edges, including segments that cross the
//! antimeridian.
//!
//! [`TileCoord`] maps Web Mercator `z/x/y` tile addresses onto windows, which
//! is how the splitter partitions a dataset.

use std::cmp::Ordering;
use std::f64::consts::PI;

use geo::{coord, Coord, Rect};

use crate::segment::Segment;
use crate::{Error, Result};

/// Latitude limit of the Web Mercator projection
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// One of the four boundaries of a [`Tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    North,
    South,
    East,
    West,
}

/// A point where a segment crosses one edge of a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub edge: Edge,
    pub point: Coord<f64>,
}

/// The portion of a segment inside a tile.
///
/// `enters` is set when `start` is a boundary crossing rather than the
/// segment's first point; `exits` likewise for `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SegmentClip {
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    pub enters: bool,
    pub exits: bool,
}

/// Returns true when the shorter path between `a` and `b` crosses the 180°
/// meridian rather than the prime meridian.
pub fn crosses_antimeridian(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x > 90.0 && b.x < -90.0) || (a.x < -90.0 && b.x > 90.0)
}

/// A rectangular clipping window in lon/lat space.
///
/// Bounds are fixed at construction. The window may extend past ±180° of
/// longitude (e.g. `west = 170, east = 190`); points are compared in the
/// window's own longitude frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl Tile {
    /// Create a window, validating that it is finite and non-empty.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        if ![north, south, east, west].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidBounds(format!(
                "bounds must be finite (north={}, south={}, east={}, west={})",
                north, south, east, west
            )));
        }
        if north <= south {
            return Err(Error::InvalidBounds(format!(
                "north ({}) must be greater than south ({})",
                north, south
            )));
        }
        if east <= west {
            return Err(Error::InvalidBounds(format!(
                "east ({}) must be greater than west ({})",
                east, west
            )));
        }

        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// Create a window from a `geo::Rect` (x = longitude, y = latitude).
    pub fn from_rect(rect: Rect<f64>) -> Result<Self> {
        Self::new(rect.max().y, rect.min().y, rect.max().x, rect.min().x)
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    /// Longitude of the window centre
    pub fn center_lon(&self) -> f64 {
        (self.east + self.west) / 2.0
    }

    /// Latitude of the window centre
    pub fn center_lat(&self) -> f64 {
        (self.north + self.south) / 2.0
    }

    /// Width in degrees of longitude
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        )
    }

    /// True when the window lies in the conventional `[-180, 180]` range.
    pub fn is_within_world(&self) -> bool {
        self.west >= -180.0 && self.east <= 180.0
    }

    /// Map a longitude into the window's frame, i.e. the representative
    /// `lon + k * 360` closest to the window centre.
    pub fn wrap_lon(&self, lon: f64) -> f64 {
        lon - 360.0 * ((lon - self.center_lon()) / 360.0).round()
    }

    /// Map a longitude into `(east - 360, east]`.
    ///
    /// Agrees with [`Tile::wrap_lon`] for every longitude inside the window,
    /// but keeps `east` itself when the window is a full turn wide.
    pub(crate) fn half_open_lon(&self, lon: f64) -> f64 {
        lon - 360.0 * ((lon - self.east) / 360.0).ceil()
    }

    /// Map a point into the window's longitude frame.
    pub fn wrap(&self, point: Coord<f64>) -> Coord<f64> {
        coord! { x: self.wrap_lon(point.x), y: point.y }
    }

    /// Half-open containment: `west < lon <= east` and `south < lat <= north`.
    ///
    /// A point on the boundary shared by two adjacent tiles belongs to exactly
    /// one of them.
    pub fn contains(&self, point: Coord<f64>) -> bool {
        let lon = self.half_open_lon(point.x);
        lon > self.west && lon <= self.east && point.y > self.south && point.y <= self.north
    }

    /// Closed containment (boundary included), in the window's frame.
    pub fn covers(&self, point: Coord<f64>) -> bool {
        self.covers_in_frame(self.wrap(point))
    }

    /// Closed containment for a point that is already in the window's frame.
    pub(crate) fn covers_in_frame(&self, point: Coord<f64>) -> bool {
        point.x >= self.west && point.x <= self.east && point.y >= self.south && point.y <= self.north
    }

    /// Re-express a segment's endpoints in the window's longitude frame.
    ///
    /// Segments crossing the antimeridian are first unwrapped towards the
    /// window's hemisphere (negative longitudes when `west < 0`, positive
    /// otherwise), then the pair is shifted by a whole number of turns so its
    /// midpoint sits within 180° of the window centre.
    pub fn normalize_segment(&self, a: Coord<f64>, b: Coord<f64>) -> (Coord<f64>, Coord<f64>) {
        let (mut a, mut b) = (a, b);

        if crosses_antimeridian(a, b) {
            if self.west < 0.0 {
                a.x = to_non_positive(a.x);
                b.x = to_non_positive(b.x);
            } else {
                a.x = to_non_negative(a.x);
                b.x = to_non_negative(b.x);
            }
        }

        let turns = (((a.x + b.x) / 2.0 - self.center_lon()) / 360.0).round();
        if turns != 0.0 {
            a.x -= 360.0 * turns;
            b.x -= 360.0 * turns;
        }

        (a, b)
    }

    /// Find every point where the segment `a -> b` crosses the window
    /// boundary, ordered from the end nearer `a` to the end nearer `b`.
    ///
    /// Points are returned in the window's frame. A crossing exactly at a
    /// corner is reported once.
    pub fn find_all_intersections(&self, a: Coord<f64>, b: Coord<f64>) -> Vec<Intersection> {
        let (a, b) = self.normalize_segment(a, b);
        self.intersections_in_frame(a, b)
    }

    /// The first crossing of `a -> b` with the window boundary, if any.
    pub fn find_intersection(&self, a: Coord<f64>, b: Coord<f64>) -> Option<Intersection> {
        self.find_all_intersections(a, b).into_iter().next()
    }

    /// The part of an already normalized segment that lies inside the closed
    /// window, or `None` when it only misses or grazes the window.
    pub(crate) fn clip_segment(&self, a: Coord<f64>, b: Coord<f64>) -> Option<SegmentClip> {
        match (self.covers_in_frame(a), self.covers_in_frame(b)) {
            (true, true) => Some(SegmentClip {
                start: a,
                end: b,
                enters: false,
                exits: false,
            }),
            (true, false) => {
                // The last crossing is the exit; an earlier one can only be `a`
                // itself sitting on the boundary.
                let exit = self
                    .intersections_in_frame(a, b)
                    .last()
                    .map_or(a, |i| i.point);
                Some(SegmentClip {
                    start: a,
                    end: exit,
                    enters: false,
                    exits: true,
                })
            }
            (false, true) => {
                let entry = self
                    .intersections_in_frame(a, b)
                    .first()
                    .map_or(b, |i| i.point);
                Some(SegmentClip {
                    start: entry,
                    end: b,
                    enters: true,
                    exits: false,
                })
            }
            (false, false) => {
                let crossings = self.intersections_in_frame(a, b);
                match (crossings.first(), crossings.last()) {
                    (Some(first), Some(last)) if first.point != last.point => Some(SegmentClip {
                        start: first.point,
                        end: last.point,
                        enters: true,
                        exits: true,
                    }),
                    _ => None,
                }
            }
        }
    }

    fn intersections_in_frame(&self, a: Coord<f64>, b: Coord<f64>) -> Vec<Intersection> {
        let segment = Segment::new(a, b);
        let mut intersections = Vec::with_capacity(2);

        for (edge, lat) in [(Edge::North, self.north), (Edge::South, self.south)] {
            if let Some(lon) = segment.x_at(lat) {
                if lon >= self.west && lon <= self.east {
                    intersections.push(Intersection {
                        edge,
                        point: coord! { x: lon, y: lat },
                    });
                }
            }
        }

        for (edge, lon) in [(Edge::East, self.east), (Edge::West, self.west)] {
            if let Some(lat) = segment.y_at(lon) {
                if lat >= self.south && lat <= self.north {
                    intersections.push(Intersection {
                        edge,
                        point: coord! { x: lon, y: lat },
                    });
                }
            }
        }

        // If the segment runs east, p comes before q when q is east of p.
        // Latitude breaks the tie for vertical segments.
        intersections.sort_by(|p, q| {
            let along_x = -(q.point.x - p.point.x) * segment.dx;
            let key = if along_x != 0.0 {
                along_x
            } else {
                -(q.point.y - p.point.y) * segment.dy
            };
            key.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
        });
        intersections.dedup_by(|q, p| q.point == p.point);

        intersections
    }

    /// Corners in counter-clockwise order starting at the south-west corner.
    pub fn corners(&self) -> [Coord<f64>; 4] {
        [
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.south },
            coord! { x: self.east, y: self.north },
            coord! { x: self.west, y: self.north },
        ]
    }

    /// Closed outline of the window, counter-clockwise when `ccw` is set.
    pub fn outline(&self, ccw: bool) -> Vec<Coord<f64>> {
        let mut ring = self.corners().to_vec();
        if !ccw {
            ring[1..].reverse();
        }
        ring.push(ring[0]);
        ring
    }

    /// Length of the window boundary in degrees.
    pub(crate) fn perimeter(&self) -> f64 {
        2.0 * (self.width() + self.height())
    }

    /// Distance along the boundary, counter-clockwise from the south-west
    /// corner, of the boundary point nearest to `point`.
    pub(crate) fn perimeter_position(&self, point: Coord<f64>) -> f64 {
        let (w, h) = (self.width(), self.height());
        let x = point.x.clamp(self.west, self.east);
        let y = point.y.clamp(self.south, self.north);

        let distances = [
            (point.y - self.south).abs(),
            (point.x - self.east).abs(),
            (point.y - self.north).abs(),
            (point.x - self.west).abs(),
        ];
        let nearest = (0..4)
            .min_by(|&i, &j| distances[i].total_cmp(&distances[j]))
            .unwrap_or(0);

        match nearest {
            0 => x - self.west,
            1 => w + (y - self.south),
            2 => w + h + (self.east - x),
            _ => 2.0 * w + h + (self.north - y),
        }
    }

    /// Perimeter positions of the corners, matching [`Tile::corners`].
    pub(crate) fn corner_positions(&self) -> [f64; 4] {
        let (w, h) = (self.width(), self.height());
        [0.0, w, w + h, 2.0 * w + h]
    }
}

fn to_non_positive(lon: f64) -> f64 {
    if lon > 0.0 {
        lon - 360.0 * (lon / 360.0).ceil()
    } else {
        lon
    }
}

fn to_non_negative(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0 * (-lon / 360.0).ceil()
    } else {
        lon
    }
}

/// Tile coordinates: x, y, and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// The window covered by this tile in geographic coordinates.
    pub fn bounds(&self) -> Tile {
        let n = 2_f64.powi(self.z as i32);
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

        Tile {
            north: lat(self.y as f64),
            south: lat(self.y as f64 + 1.0),
            east: (self.x as f64 + 1.0) / n * 360.0 - 180.0,
            west: (self.x as f64) / n * 360.0 - 180.0,
        }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl std::str::FromStr for TileCoord {
    type Err = Error;

    /// Parse a `z/x/y` tile address.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidBounds(format!("expected a z/x/y tile address, got {:?}", s));
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [z, x, y] = parts.as_slice() else {
            return Err(invalid());
        };

        let z: u8 = z.parse().map_err(|_| invalid())?;
        let x: u32 = x.parse().map_err(|_| invalid())?;
        let y: u32 = y.parse().map_err(|_| invalid())?;

        if z > 30 {
            return Err(Error::InvalidBounds(format!("zoom {} is above 30", z)));
        }
        let n = 1_u64 << z;
        if x as u64 >= n || y as u64 >= n {
            return Err(Error::InvalidBounds(format!(
                "tile {}/{}/{} is outside the grid",
                z, x, y
            )));
        }

        Ok(Self::new(x, y, z))
    }
}

/// Convert longitude/latitude to the Web Mercator tile containing it.
///
/// Inputs outside the projection are clamped onto the edge of the grid.
pub fn lng_lat_to_tile(lng: f64, lat: f64, zoom: u8) -> TileCoord {
    let n = 2_f64.powi(zoom as i32);
    let max_index = n - 1.0;

    let x = ((lng + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);

    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, max_index);

    TileCoord::new(x as u32, y as u32, zoom)
}

/// All tiles at `zoom` that intersect a lon/lat bounding box.
pub fn tiles_for_bbox(bbox: &Rect<f64>, zoom: u8) -> impl Iterator<Item = TileCoord> {
    // lat_max gives the smallest y
    let mut min_tile = lng_lat_to_tile(bbox.min().x, bbox.max().y, zoom);
    let max_tile = lng_lat_to_tile(bbox.max().x, bbox.min().y, zoom);

    // Tiles own their east edge, so a box starting on a west edge also
    // touches the tile to the west
    if min_tile.x > 0 && bbox.min().x <= min_tile.bounds().west() {
        min_tile.x -= 1;
    }

    (min_tile.y..=max_tile.y).flat_map(move |y| {
        (min_tile.x..=max_tile.x).map(move |x| TileCoord::new(x, y, zoom))
    })
}
