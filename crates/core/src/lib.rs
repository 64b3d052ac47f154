//! Core library for clipping GeoJSON geometry to rectangular lat/lon tiles.
//!
//! The clipping engine takes a window (`north`, `south`, `east`, `west`) and
//! returns the part of each geometry that lies inside it, keeping feature
//! metadata intact. Windows may straddle the antimeridian. On top of it the
//! [`Splitter`] partitions a whole dataset into Web Mercator `z/x/y` tiles.
//!
//! # Examples
//!
//! ```
//! use geo::{Geometry, LineString};
//! use geotile_core::{clip_geometry, Tile};
//!
//! let tile = Tile::new(10.0, 0.0, 10.0, 0.0).unwrap();
//! let line = Geometry::LineString(LineString::from(vec![(-5.0, 5.0), (5.0, 5.0)]));
//!
//! let clipped = clip_geometry(&tile, &line).unwrap();
//! assert_eq!(
//!     clipped,
//!     Some(Geometry::LineString(LineString::from(vec![(0.0, 5.0), (5.0, 5.0)])))
//! );
//! ```
//!
//! ```no_run
//! use geotile_core::{Config, Splitter};
//!
//! let config = Config::default().with_zoom_range(0, 6);
//! let splitter = Splitter::new(config);
//! splitter.split_file("input.geojson", "tiles/").unwrap();
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use geo::{BoundingRect, Rect};
use geojson::{Feature, FeatureCollection, GeoJson};
use thiserror::Error;

use crate::tile::{tiles_for_bbox, TileCoord};

pub mod clip;
pub mod feature;
#[cfg(test)]
mod integration_tests;
pub mod line;
pub mod polygon;
pub mod segment;
pub mod tile;
pub mod validate;

pub use clip::clip_geometry;
pub use feature::{clip_feature, ClipReport, ClippedTile};
pub use line::constrain_line;
pub use polygon::{clip_polygon, constrain_polygon};
pub use segment::Segment;
pub use tile::{Edge, Intersection, Tile};

/// Highest zoom level the tile grid supports
pub const MAX_ZOOM: u8 = 30;

/// Errors that can occur while clipping or splitting
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid tile bounds: {0}")]
    InvalidBounds(String),

    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    #[error("Malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("Invalid geometry at feature {feature_id}: {reason}")]
    InvalidGeometry { feature_id: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for splitting a dataset into tiles
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum zoom level to generate
    pub min_zoom: u8,
    /// Maximum zoom level to generate
    pub max_zoom: u8,
    /// Leave out tiles where no feature survives clipping
    pub skip_empty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 14,
            skip_empty: true,
        }
    }
}

impl Config {
    /// Set the zoom range.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Set whether tiles without features are left out.
    pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_zoom > self.max_zoom {
            return Err(Error::InvalidConfig(format!(
                "min_zoom ({}) is greater than max_zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.max_zoom > MAX_ZOOM {
            return Err(Error::InvalidConfig(format!(
                "max_zoom ({}) is above {}",
                self.max_zoom, MAX_ZOOM
            )));
        }
        Ok(())
    }
}

/// Totals for one [`Splitter::split_file`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Features read from the input
    pub features_read: usize,
    /// Tile files written
    pub tiles_written: usize,
    /// Clipped features written, summed over all tiles
    pub features_written: usize,
}

/// A feature prepared once for every tile it may land in.
struct Candidate<'a> {
    /// Position in the input collection
    index: usize,
    feature: &'a Feature,
    bbox: Rect<f64>,
    /// Longitudes may wrap, so the raw bbox cannot rule tiles out
    spans_antimeridian: bool,
}

/// Partitions a dataset into per-tile FeatureCollections
pub struct Splitter {
    config: Config,
}

impl Splitter {
    /// Create a new splitter with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clip a collection into every tile of the configured zoom range that
    /// covers its bounds.
    ///
    /// Tiles come back ordered by zoom, then row, then column. Features that
    /// fail to clip are logged and left out of every tile.
    pub fn split(&self, collection: &FeatureCollection) -> Result<Vec<(TileCoord, FeatureCollection)>> {
        self.config.validate()?;

        let candidates = prepare(&collection.features);
        let Some(bounds) = dataset_bounds(&candidates) else {
            log::info!("No features with geometry; nothing to split");
            return Ok(Vec::new());
        };

        log::info!(
            "Dataset bounds: ({}, {}) to ({}, {})",
            bounds.min().x,
            bounds.min().y,
            bounds.max().x,
            bounds.max().y
        );

        let mut failed: HashSet<usize> = HashSet::new();
        let mut tiles = Vec::new();

        for zoom in self.config.min_zoom..=self.config.max_zoom {
            let mut zoom_tiles = 0;
            for coord in tiles_for_bbox(&bounds, zoom) {
                let window = coord.bounds();
                let mut clipped = ClippedTile::new(window);

                for candidate in &candidates {
                    if failed.contains(&candidate.index) {
                        continue;
                    }
                    if !candidate.spans_antimeridian && !overlaps(&candidate.bbox, &window.to_rect()) {
                        continue;
                    }
                    if let Err(e) = clipped.add_feature(candidate.feature) {
                        log::warn!("Skipping feature {}: {}", candidate.index, e);
                        failed.insert(candidate.index);
                    }
                }

                log::debug!("Tile {}: {} features", coord, clipped.len());
                if clipped.is_empty() && self.config.skip_empty {
                    continue;
                }
                zoom_tiles += 1;
                tiles.push((coord, clipped.to_feature_collection()));
            }
            log::info!("  Zoom {}: {} tiles", zoom, zoom_tiles);
        }

        Ok(tiles)
    }

    /// Split a GeoJSON file and write `{output_dir}/{z}/{x}/{y}.geojson`.
    pub fn split_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output_dir: Q) -> Result<SplitStats> {
        let input_path = input.as_ref();
        let output_dir = output_dir.as_ref();

        log::info!(
            "Splitting {} into {}",
            input_path.display(),
            output_dir.display()
        );

        let collection = read_collection(input_path)?;
        let tiles = self.split(&collection)?;

        let mut stats = SplitStats {
            features_read: collection.features.len(),
            ..Default::default()
        };

        for (coord, fc) in &tiles {
            let dir = output_dir.join(coord.z.to_string()).join(coord.x.to_string());
            fs::create_dir_all(&dir)?;

            let json = serde_json::to_string(fc).map_err(|e| Error::GeoJson(e.to_string()))?;
            fs::write(dir.join(format!("{}.geojson", coord.y)), json)?;

            stats.tiles_written += 1;
            stats.features_written += fc.features.len();
        }

        log::info!(
            "Wrote {} tiles holding {} features from {} input features",
            stats.tiles_written,
            stats.features_written,
            stats.features_read
        );

        Ok(stats)
    }
}

/// Read a GeoJSON file as a FeatureCollection.
///
/// A lone Feature or Geometry is wrapped in a one-element collection.
pub fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))))?;
    let geojson: GeoJson = content
        .parse()
        .map_err(|e: geojson::Error| Error::GeoJson(e.to_string()))?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => return Ok(fc),
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
    };
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn prepare(features: &[Feature]) -> Vec<Candidate<'_>> {
    features
        .iter()
        .enumerate()
        .filter_map(|(index, feature)| {
            let geometry = feature.geometry.as_ref()?;
            let geom: geo::Geometry<f64> = match geometry.clone().try_into() {
                Ok(geom) => geom,
                Err(e) => {
                    log::warn!("Skipping feature {}: {}", index, e);
                    return None;
                }
            };
            Some(Candidate {
                index,
                feature,
                bbox: geom.bounding_rect()?,
                spans_antimeridian: clip::spans_antimeridian(&geom),
            })
        })
        .collect()
}

/// Union of the candidate boxes, widened to every longitude when any
/// candidate wraps around the antimeridian.
fn dataset_bounds(candidates: &[Candidate<'_>]) -> Option<Rect<f64>> {
    let mut iter = candidates.iter();
    let first = iter.next()?;
    let (mut min, mut max) = (first.bbox.min(), first.bbox.max());
    let mut wraps = first.spans_antimeridian;

    for candidate in iter {
        min.x = min.x.min(candidate.bbox.min().x);
        min.y = min.y.min(candidate.bbox.min().y);
        max.x = max.x.max(candidate.bbox.max().x);
        max.y = max.y.max(candidate.bbox.max().y);
        wraps |= candidate.spans_antimeridian;
    }

    if wraps {
        min.x = -180.0;
        max.x = 180.0;
    }
    Some(Rect::new(min, max))
}

fn overlaps(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.max().x >= b.min().x && a.min().x <= b.max().x && a.max().y >= b.min().y && a.min().y <= b.max().y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(json: &str) -> FeatureCollection {
        json.parse().unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.min_zoom, 0);
        assert_eq!(config.max_zoom, 14);
        assert!(config.skip_empty);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::default().with_zoom_range(2, 5).with_skip_empty(false);
        assert_eq!((config.min_zoom, config.max_zoom), (2, 5));
        assert!(!config.skip_empty);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(matches!(
            Config::default().with_zoom_range(5, 2).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(Config::default().with_zoom_range(0, 31).validate().is_err());
    }

    #[test]
    fn test_split_single_point() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"n": 1}, "geometry": {"type": "Point", "coordinates": [10, 10]}}
            ]}"#,
        );
        let splitter = Splitter::new(Config::default().with_zoom_range(0, 3));
        let tiles = splitter.split(&fc).unwrap();

        // One tile per zoom, each holding the point
        assert_eq!(tiles.len(), 4);
        for (zoom, (coord, tile_fc)) in tiles.iter().enumerate() {
            assert_eq!(coord.z as usize, zoom);
            assert_eq!(tile_fc.features.len(), 1);
        }
    }

    #[test]
    fn test_split_line_across_tiles() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[-10, 10], [10, 10]]}}
            ]}"#,
        );
        let splitter = Splitter::new(Config::default().with_zoom_range(1, 1));
        let tiles = splitter.split(&fc).unwrap();

        let coords: Vec<String> = tiles.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(coords, vec!["1/0/0", "1/1/0"]);
    }

    #[test]
    fn test_split_keeps_empty_tiles_when_asked() {
        // Diagonal line: its bbox covers all four z1 tiles but it misses two
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[-100, -40], [-10, -5], [100, 40]]}}
            ]}"#,
        );

        let skipping = Splitter::new(Config::default().with_zoom_range(1, 1));
        let keeping = Splitter::new(Config::default().with_zoom_range(1, 1).with_skip_empty(false));

        let kept = keeping.split(&fc).unwrap();
        assert_eq!(kept.len(), 4);
        assert!(skipping.split(&fc).unwrap().len() < 4);
        assert!(kept.iter().any(|(_, tile)| tile.features.is_empty()));
    }

    #[test]
    fn test_split_skips_bad_features() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "MultiPoint", "coordinates": [[1, 1]]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 1]}}
            ]}"#,
        );
        let tiles = Splitter::new(Config::default().with_zoom_range(0, 0)).split(&fc).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].1.features.len(), 1);
    }

    #[test]
    fn test_split_empty_collection() {
        let fc = collection(r#"{"type": "FeatureCollection", "features": []}"#);
        assert!(Splitter::new(Config::default()).split(&fc).unwrap().is_empty());
    }

    #[test]
    fn test_split_file_writes_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.geojson");
        fs::write(
            &input,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "a"}, "geometry": {"type": "Point", "coordinates": [10, 10]}}
            ]}"#,
        )
        .unwrap();

        let output = dir.path().join("tiles");
        let stats = Splitter::new(Config::default().with_zoom_range(0, 1))
            .split_file(&input, &output)
            .unwrap();

        assert_eq!(
            stats,
            SplitStats {
                features_read: 1,
                tiles_written: 2,
                features_written: 2,
            }
        );
        assert!(output.join("0/0/0.geojson").exists());
        assert!(output.join("1/1/0.geojson").exists());

        let written: GeoJson = fs::read_to_string(output.join("1/1/0.geojson"))
            .unwrap()
            .parse()
            .unwrap();
        assert!(matches!(written, GeoJson::FeatureCollection(fc) if fc.features.len() == 1));
    }

    #[test]
    fn test_split_keeps_point_on_antimeridian_at_zoom_zero() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [180, 0]}}
            ]}"#,
        );
        let tiles = Splitter::new(Config::default().with_zoom_range(0, 0)).split(&fc).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].1.features.len(), 1);
    }

    #[test]
    fn test_read_collection_missing_file() {
        let err = read_collection(Path::new("/nonexistent/input.geojson")).unwrap_err();
        match err {
            Error::Io(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
                assert!(e.to_string().contains("/nonexistent/input.geojson"));
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_split_file_missing_input() {
        let result = Splitter::new(Config::default()).split_file("/nonexistent/input.geojson", "/tmp/out");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
