//! Clipping GeoJSON features.
//!
//! A [`ClippedTile`] collects the clipped copies of every feature that
//! overlaps one tile. Only the geometry of a feature is replaced; its id,
//! properties and foreign members travel along unchanged.

use geo::BoundingRect;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::json;

use crate::clip::clip_geometry;
use crate::tile::Tile;
use crate::{Error, Result};

/// Outcome of adding a batch of features to a [`ClippedTile`].
#[derive(Debug, Default)]
pub struct ClipReport {
    /// Features with something left inside the tile
    pub retained: usize,
    /// Features entirely outside the tile, or without geometry
    pub discarded: usize,
    /// Features that could not be clipped, as [`Error::InvalidGeometry`]
    pub errors: Vec<Error>,
}

/// The features of a dataset clipped to one tile.
#[derive(Debug, Clone)]
pub struct ClippedTile {
    tile: Tile,
    features: Vec<Feature>,
}

impl ClippedTile {
    pub fn new(tile: Tile) -> Self {
        Self {
            tile,
            features: Vec::new(),
        }
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Clip a feature and keep it if anything survives.
    ///
    /// Returns `Ok(true)` when the feature was kept. Features without a
    /// geometry are skipped with a warning.
    pub fn add_feature(&mut self, feature: &Feature) -> Result<bool> {
        match clip_feature(&self.tile, feature)? {
            Some(clipped) => {
                self.features.push(clipped);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add every feature of a GeoJSON document.
    ///
    /// A bare geometry counts as one feature without properties. A failure
    /// is recorded in the report and does not stop the remaining features.
    pub fn add_geojson(&mut self, geojson: GeoJson) -> ClipReport {
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
        };

        let mut report = ClipReport::default();
        for (feature_id, feature) in features.iter().enumerate() {
            match self.add_feature(feature) {
                Ok(true) => report.retained += 1,
                Ok(false) => report.discarded += 1,
                Err(e) => {
                    log::warn!("Skipping feature {}: {}", feature_id, e);
                    report.errors.push(Error::InvalidGeometry {
                        feature_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::debug!(
            "Tile ({}, {}, {}, {}): {} retained, {} discarded, {} errors",
            self.tile.north(),
            self.tile.south(),
            self.tile.east(),
            self.tile.west(),
            report.retained,
            report.discarded,
            report.errors.len()
        );
        report
    }

    /// Render the stored features as a FeatureCollection.
    ///
    /// The collection's `bbox` is the tile window and a `bounds` foreign
    /// member spells the window out by name.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let t = &self.tile;
        let mut foreign_members = JsonObject::new();
        foreign_members.insert(
            "bounds".to_string(),
            json!({
                "north": t.north(),
                "south": t.south(),
                "east": t.east(),
                "west": t.west(),
            }),
        );

        FeatureCollection {
            bbox: Some(vec![t.west(), t.south(), t.east(), t.north()]),
            features: self.features.clone(),
            foreign_members: Some(foreign_members),
        }
    }
}

/// Clip one feature to a tile.
///
/// Returns a copy of the feature carrying the clipped geometry, or `None`
/// when the feature has no geometry or nothing of it lies in the tile. A
/// `bbox` on the input is recomputed for the clipped geometry.
pub fn clip_feature(tile: &Tile, feature: &Feature) -> Result<Option<Feature>> {
    let Some(geometry) = &feature.geometry else {
        log::warn!("Skipping feature {:?} without geometry", feature.id);
        return Ok(None);
    };

    let geom: geo::Geometry<f64> = geometry
        .clone()
        .try_into()
        .map_err(|e: geojson::Error| Error::GeoJson(e.to_string()))?;

    let Some(clipped) = clip_geometry(tile, &geom)? else {
        return Ok(None);
    };

    let bbox = match (&feature.bbox, clipped.bounding_rect()) {
        (Some(_), Some(rect)) => Some(vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]),
        _ => None,
    };

    Ok(Some(Feature {
        bbox,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&clipped))),
        id: feature.id.clone(),
        properties: feature.properties.clone(),
        foreign_members: feature.foreign_members.clone(),
    }))
}
