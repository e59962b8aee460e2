//! Feature index: hit-testing from rendered buckets back to style layers.
//!
//! Buckets register the bounds of every feature they draw. Each processed
//! style layer records which bucket carries its features, so a hit on a
//! shared bucket is reported for every layer drawing from it. Symbols are
//! looked up through the collision tile attached after placement.

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec2;
use rstar::{RTree, RTreeObject, AABB};

use crate::labels::CollisionTile;
use crate::tile::OverscaledTileId;

/// A feature's bounds in tile units.
#[derive(Debug, Clone)]
pub struct IndexedFeature {
    pub bounds: [f32; 4],
    pub feature_index: usize,
    pub source_layer: String,
    pub bucket_name: String,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds[0], self.bounds[1]],
            [self.bounds[2], self.bounds[3]],
        )
    }
}

/// A query hit, attributed to one style layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeatureHit {
    pub source_layer: String,
    pub feature_index: usize,
}

#[derive(Debug)]
pub struct FeatureIndex {
    tile_id: OverscaledTileId,
    tree: RTree<IndexedFeature>,
    bucket_layer_ids: HashMap<String, Vec<String>>,
    collision_tile: Option<CollisionTile>,
}

impl FeatureIndex {
    pub fn new(tile_id: OverscaledTileId) -> Self {
        Self {
            tile_id,
            tree: RTree::new(),
            bucket_layer_ids: HashMap::new(),
            collision_tile: None,
        }
    }

    pub fn tile_id(&self) -> OverscaledTileId {
        self.tile_id
    }

    /// Register a drawn feature.
    pub fn insert(
        &mut self,
        bounds: [f32; 4],
        feature_index: usize,
        source_layer: &str,
        bucket_name: &str,
    ) {
        self.tree.insert(IndexedFeature {
            bounds,
            feature_index,
            source_layer: source_layer.to_string(),
            bucket_name: bucket_name.to_string(),
        });
    }

    /// Record that `layer_id` draws from `bucket_name`.
    pub fn add_bucket_layer_name(&mut self, bucket_name: &str, layer_id: &str) {
        self.bucket_layer_ids
            .entry(bucket_name.to_string())
            .or_default()
            .push(layer_id.to_string());
    }

    /// Style layer ids drawing from `bucket_name`, in processing order.
    pub fn layer_ids(&self, bucket_name: &str) -> &[String] {
        self.bucket_layer_ids
            .get(bucket_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.bucket_layer_ids.keys().map(String::as_str)
    }

    pub fn set_collision_tile(&mut self, collision_tile: CollisionTile) {
        self.collision_tile = Some(collision_tile);
    }

    pub fn collision_tile(&self) -> Option<&CollisionTile> {
        self.collision_tile.as_ref()
    }

    pub fn feature_count(&self) -> usize {
        self.tree.size()
    }

    /// Features intersecting `bounds` (tile units), grouped by style layer
    /// id.
    pub fn query(&self, bounds: [f32; 4]) -> BTreeMap<String, Vec<FeatureHit>> {
        let mut hits: HashSet<(&str, &str, usize)> = HashSet::new();

        let envelope = AABB::from_corners([bounds[0], bounds[1]], [bounds[2], bounds[3]]);
        for feature in self.tree.locate_in_envelope_intersecting(&envelope) {
            hits.insert((
                feature.bucket_name.as_str(),
                feature.source_layer.as_str(),
                feature.feature_index,
            ));
        }

        if let Some(collision_tile) = &self.collision_tile {
            let screen = self.screen_bounds(collision_tile, bounds);
            for symbol in collision_tile.query_rendered_symbols(screen) {
                hits.insert((
                    symbol.bucket_name.as_str(),
                    symbol.source_layer.as_str(),
                    symbol.feature_index,
                ));
            }
        }

        let mut grouped: BTreeMap<String, Vec<FeatureHit>> = BTreeMap::new();
        for (bucket_name, source_layer, feature_index) in hits {
            for layer_id in self.layer_ids(bucket_name) {
                grouped.entry(layer_id.clone()).or_default().push(FeatureHit {
                    source_layer: source_layer.to_string(),
                    feature_index,
                });
            }
        }
        for layer_hits in grouped.values_mut() {
            layer_hits.sort();
        }
        grouped
    }

    /// Collision-space box covering tile-unit `bounds`.
    fn screen_bounds(&self, collision_tile: &CollisionTile, bounds: [f32; 4]) -> [f32; 4] {
        let scale = self.tile_id.pixels_per_unit();
        let corners = [
            Vec2::new(bounds[0], bounds[1]),
            Vec2::new(bounds[2], bounds[1]),
            Vec2::new(bounds[2], bounds[3]),
            Vec2::new(bounds[0], bounds[3]),
        ]
        .map(|corner| collision_tile.project(corner * scale));

        let mut min = corners[0];
        let mut max = corners[0];
        for corner in &corners[1..] {
            min = min.min(*corner);
            max = max.max(*corner);
        }
        [min.x, min.y, max.x, max.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementConfig;
    use crate::labels::SymbolRef;

    fn index() -> FeatureIndex {
        FeatureIndex::new(OverscaledTileId::native(14, 8192, 5461))
    }

    #[test]
    fn test_shared_bucket_reports_every_layer() {
        let mut index = index();
        index.add_bucket_layer_name("road", "road-casing");
        index.add_bucket_layer_name("road", "road-fill");
        index.insert([0.0, 0.0, 100.0, 10.0], 3, "road", "road");

        let hits = index.query([50.0, 0.0, 60.0, 5.0]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits["road-casing"][0].feature_index, 3);
        assert_eq!(hits["road-fill"][0].source_layer, "road");
    }

    #[test]
    fn test_query_misses() {
        let mut index = index();
        index.add_bucket_layer_name("water", "water");
        index.insert([0.0, 0.0, 10.0, 10.0], 0, "water", "water");
        assert!(index.query([20.0, 20.0, 30.0, 30.0]).is_empty());
        assert_eq!(index.feature_count(), 1);
    }

    #[test]
    fn test_layer_ids_for_unknown_bucket() {
        assert!(index().layer_ids("missing").is_empty());
    }

    #[test]
    fn test_query_rendered_symbols() {
        let mut index = index();
        index.add_bucket_layer_name("labels", "poi-label");

        let mut tile = CollisionTile::new(PlacementConfig::default());
        // Tile unit 1600 is pixel 100 at native zoom.
        tile.insert(
            [90.0, 95.0, 110.0, 105.0],
            SymbolRef {
                bucket_name: "labels".to_string(),
                source_layer: "poi".to_string(),
                feature_index: 7,
            },
        );
        index.set_collision_tile(tile);
        assert!(index.collision_tile().is_some());

        let hits = index.query([1590.0, 1590.0, 1610.0, 1610.0]);
        assert_eq!(hits["poi-label"][0].feature_index, 7);
        assert!(index.query([0.0, 0.0, 16.0, 16.0]).is_empty());
    }
}
