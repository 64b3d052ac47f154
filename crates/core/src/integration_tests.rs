//! End-to-end tests driving GeoJSON documents through the feature layer.
//!
//! These tests verify the full path:
//! GeoJSON text → ClippedTile → FeatureCollection → GeoJSON text
//!
//! # Testing Strategy
//!
//! Rings are compared modulo their starting vertex, since the clipper is free
//! to start an output ring at any point of it. Everything else is compared
//! exactly.

#[cfg(test)]
mod tests {
    use crate::feature::ClippedTile;
    use crate::tile::Tile;
    use crate::{Config, Splitter};
    use geojson::{FeatureCollection, GeoJson, Value};
    use serde_json::json;

    const PARALLELOGRAM: &str = r#"{
        "type": "Feature",
        "properties": {"name": "Parallelogramistan"},
        "extra": "data",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[2, 15], [12, 15], [18, 5], [8, 5], [2, 15]]]
        }
    }"#;

    const ZIGZAG: &str = r#"{
        "type": "Feature",
        "properties": {"name": "Zigzag"},
        "geometry": {
            "type": "LineString",
            "coordinates": [[5, 5], [15, 5], [15, 15], [5, 15], [5, 8]]
        }
    }"#;

    fn clip(json: &str, north: f64, south: f64, east: f64, west: f64) -> FeatureCollection {
        let mut tile = ClippedTile::new(Tile::new(north, south, east, west).unwrap());
        let report = tile.add_geojson(json.parse::<GeoJson>().unwrap());
        assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
        tile.to_feature_collection()
    }

    fn geometry(fc: &FeatureCollection, index: usize) -> Value {
        fc.features[index].geometry.clone().unwrap().value
    }

    /// Assert a closed ring equals `expected` up to rotation.
    fn assert_ring(actual: &[Vec<f64>], expected: &[[f64; 2]]) {
        assert_eq!(actual.first(), actual.last(), "ring is not closed");
        let open = &actual[..actual.len() - 1];
        assert_eq!(open.len(), expected.len(), "got {:?}", actual);

        let start = open
            .iter()
            .position(|p| p[..] == expected[0][..])
            .unwrap_or_else(|| panic!("{:?} not found in {:?}", expected[0], actual));
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(open[(start + i) % open.len()][..], want[..], "ring {:?}", actual);
        }
    }

    // ========== Polygon Scenarios ==========

    #[test]
    fn test_constrains_a_polygon() {
        let fc = clip(PARALLELOGRAM, 10.0, 0.0, 10.0, 0.0);
        match geometry(&fc, 0) {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_ring(&rings[0], &[[10.0, 10.0], [10.0, 5.0], [8.0, 5.0], [5.0, 10.0]]);
            }
            other => panic!("expected Polygon, got {:?}", other),
        }

        let fc = clip(PARALLELOGRAM, 10.0, 0.0, 20.0, 10.0);
        match geometry(&fc, 0) {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_ring(&rings[0], &[[10.0, 10.0], [15.0, 10.0], [18.0, 5.0], [10.0, 5.0]]);
            }
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_retains_properties_and_foreign_members() {
        let fc = clip(PARALLELOGRAM, 10.0, 0.0, 10.0, 0.0);
        let feature = &fc.features[0];

        assert_eq!(feature.property("name"), Some(&json!("Parallelogramistan")));
        let extra = feature.foreign_members.as_ref().and_then(|m| m.get("extra"));
        assert_eq!(extra, Some(&json!("data")));
    }

    // ========== LineString Scenarios ==========

    #[test]
    fn test_constrains_a_line_into_several_fragments() {
        let fc = clip(ZIGZAG, 10.0, 0.0, 10.0, 0.0);
        assert_eq!(
            geometry(&fc, 0),
            Value::MultiLineString(vec![
                vec![vec![5.0, 5.0], vec![10.0, 5.0]],
                vec![vec![5.0, 10.0], vec![5.0, 8.0]],
            ])
        );
    }

    #[test]
    fn test_constrains_a_line_into_one_fragment() {
        let fc = clip(ZIGZAG, 10.0, 0.0, 20.0, 10.0);
        assert_eq!(
            geometry(&fc, 0),
            Value::LineString(vec![vec![10.0, 5.0], vec![15.0, 5.0], vec![15.0, 10.0]])
        );
    }

    // ========== Collections ==========

    #[test]
    fn test_collection_round_trips_through_json() {
        let collection = format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
            PARALLELOGRAM, ZIGZAG
        );
        let fc = clip(&collection, 10.0, 0.0, 10.0, 0.0);
        assert_eq!(fc.features.len(), 2);

        let text = serde_json::to_string(&fc).unwrap();
        let parsed: GeoJson = text.parse().unwrap();
        let GeoJson::FeatureCollection(parsed) = parsed else {
            panic!("expected FeatureCollection");
        };
        assert_eq!(parsed.features.len(), 2);
        assert_eq!(parsed.bbox, Some(vec![0.0, 0.0, 10.0, 10.0]));
        let bounds = parsed.foreign_members.unwrap()["bounds"].clone();
        assert_eq!(bounds, json!({"north": 10.0, "south": 0.0, "east": 10.0, "west": 0.0}));
    }

    #[test]
    fn test_tile_across_antimeridian() {
        let square = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[175, -5], [-175, -5], [-175, 5], [175, 5], [175, -5]]]
            }
        }"#;

        let east = clip(square, 10.0, -10.0, 180.0, 170.0);
        match geometry(&east, 0) {
            Value::Polygon(rings) => {
                assert_ring(&rings[0], &[[180.0, 5.0], [175.0, 5.0], [175.0, -5.0], [180.0, -5.0]]);
            }
            other => panic!("expected Polygon, got {:?}", other),
        }

        // A window past 180 sees the whole square in its own frame
        let straddling = clip(square, 10.0, -10.0, 190.0, 170.0);
        match geometry(&straddling, 0) {
            Value::Polygon(rings) => {
                assert_ring(&rings[0], &[[175.0, -5.0], [185.0, -5.0], [185.0, 5.0], [175.0, 5.0]]);
            }
            other => panic!("expected Polygon, got {:?}", other),
        }
    }

    // ========== Splitting ==========

    #[test]
    fn test_split_parallelogram_keeps_metadata_in_every_tile() {
        let collection: FeatureCollection = format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            PARALLELOGRAM
        )
        .parse()
        .unwrap();

        let tiles = Splitter::new(Config::default().with_zoom_range(0, 5))
            .split(&collection)
            .unwrap();

        assert!(tiles.len() > 5);
        for (coord, fc) in &tiles {
            assert_eq!(fc.features.len(), 1, "tile {}", coord);
            assert_eq!(
                fc.features[0].property("name"),
                Some(&json!("Parallelogramistan"))
            );
        }
    }
}
