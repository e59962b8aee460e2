//! Decoded vector tile geometry.
//!
//! Wire-format decoding happens elsewhere; the worker only needs to look up
//! source layers by name and walk their features. Coordinates are in tile
//! units, `0..EXTENT` on both axes.

use std::collections::HashMap;
use std::fmt;

use glam::Vec2;
use serde_json::{Map, Value};

/// Tile coordinate extent.
pub const EXTENT: f32 = 8192.0;

/// Size of a tile on screen at its render zoom, in pixels.
pub const TILE_SIZE: f32 = 512.0;

/// Feature properties, keyed by attribute name.
pub type Properties = Map<String, Value>;

/// Geometry type of a tile feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl FeatureType {
    /// Name used by the `$type` filter key.
    pub fn filter_name(self) -> &'static str {
        match self {
            FeatureType::Unknown => "Unknown",
            FeatureType::Point => "Point",
            FeatureType::LineString => "LineString",
            FeatureType::Polygon => "Polygon",
        }
    }
}

/// A single decoded feature.
#[derive(Debug, Clone)]
pub struct GeometryFeature {
    pub id: Option<u64>,
    pub feature_type: FeatureType,
    /// Points, line parts, or polygon rings (exterior first, then holes).
    pub geometry: Vec<Vec<Vec2>>,
    pub properties: Properties,
}

impl GeometryFeature {
    pub fn point(position: Vec2) -> Self {
        Self {
            id: None,
            feature_type: FeatureType::Point,
            geometry: vec![vec![position]],
            properties: Properties::new(),
        }
    }

    pub fn line(path: Vec<Vec2>) -> Self {
        Self {
            id: None,
            feature_type: FeatureType::LineString,
            geometry: vec![path],
            properties: Properties::new(),
        }
    }

    pub fn polygon(rings: Vec<Vec<Vec2>>) -> Self {
        Self {
            id: None,
            feature_type: FeatureType::Polygon,
            geometry: rings,
            properties: Properties::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Axis-aligned bounds `[x0, y0, x1, y1]`, or `None` for empty geometry.
    pub fn bounds(&self) -> Option<[f32; 4]> {
        let mut points = self.geometry.iter().flatten();
        let first = points.next()?;
        let mut min = *first;
        let mut max = *first;
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Some([min.x, min.y, max.x, max.y])
    }
}

/// One named layer of a geometry tile.
#[derive(Debug, Clone, Default)]
pub struct GeometryTileLayer {
    pub name: String,
    pub features: Vec<GeometryFeature>,
}

impl GeometryTileLayer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: GeometryFeature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

/// Read access to decoded tile data. Shared read-only across workers.
pub trait GeometryTile: Send + Sync + fmt::Debug {
    fn layer(&self, name: &str) -> Option<&GeometryTileLayer>;
}

/// In-memory geometry tile.
#[derive(Debug, Clone, Default)]
pub struct VectorTileData {
    layers: HashMap<String, GeometryTileLayer>,
}

impl VectorTileData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: GeometryTileLayer) -> Self {
        self.add_layer(layer);
        self
    }

    pub fn add_layer(&mut self, layer: GeometryTileLayer) {
        self.layers.insert(layer.name.clone(), layer);
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(|s| s.as_str())
    }
}

impl GeometryTile for VectorTileData {
    fn layer(&self, name: &str) -> Option<&GeometryTileLayer> {
        self.layers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_bounds() {
        let feature = GeometryFeature::line(vec![
            Vec2::new(10.0, 40.0),
            Vec2::new(30.0, 20.0),
            Vec2::new(5.0, 25.0),
        ]);
        assert_eq!(feature.bounds(), Some([5.0, 20.0, 30.0, 40.0]));
        assert_eq!(GeometryFeature::polygon(vec![]).bounds(), None);
    }

    #[test]
    fn test_layer_lookup() {
        let tile = VectorTileData::new()
            .with_layer(GeometryTileLayer::new("water"))
            .with_layer(GeometryTileLayer::new("roads"));
        assert!(tile.layer("water").is_some());
        assert!(tile.layer("buildings").is_none());
        assert_eq!(tile.layer_names().count(), 2);
    }

    #[test]
    fn test_properties() {
        let feature = GeometryFeature::point(Vec2::ZERO)
            .with_id(7)
            .with_property("name", "Harbor")
            .with_property("rank", 3);
        assert_eq!(feature.id, Some(7));
        assert_eq!(feature.properties["name"], "Harbor");
        assert_eq!(feature.properties["rank"], 3);
    }
}
