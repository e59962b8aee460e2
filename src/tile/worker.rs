//! Tile worker: turns a geometry tile and a style layer stack into buckets.
//!
//! One worker serves one tile. A full parse walks the layer stack in reverse
//! declaration order, building one bucket per bucket name. Symbol buckets
//! whose glyphs or icons are not resident yet are parked as pending and
//! resolved by later `parse_pending` calls; once nothing is pending, symbols
//! are placed against a fresh collision tile and the result is complete.
//!
//! The worker is not reentrant. Shared stores carry their own locking.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::bucket::{Bucket, BucketParameters, DependentBucket};
use crate::config::{MapMode, PlacementConfig};
use crate::labels::{CollisionTile, GlyphAtlas, GlyphStore};
use crate::style::layer::StyleLayer;
use crate::style::sprite::SpriteStore;
use crate::tile::feature_index::FeatureIndex;
use crate::tile::geometry::GeometryTile;
use crate::tile::{OverscaledTileId, WorkerId};

/// Output of one worker call.
///
/// `feature_index` and `geometry_tile` are only handed over with the call
/// that completes the parse.
#[derive(Debug, Default)]
pub struct TileParseResult {
    pub complete: bool,
    pub buckets: HashMap<String, Bucket>,
    pub feature_index: Option<FeatureIndex>,
    pub geometry_tile: Option<Box<dyn GeometryTile>>,
}

impl TileParseResult {
    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.get(name)
    }

    /// Bucket names, sorted.
    pub fn bucket_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fold a later result of the same parse into this one. Each call hands
    /// over only the buckets it finished, so the owner accumulates them.
    pub fn merge(&mut self, later: TileParseResult) {
        self.complete = later.complete;
        self.buckets.extend(later.buckets);
        if later.feature_index.is_some() {
            self.feature_index = later.feature_index;
        }
        if later.geometry_tile.is_some() {
            self.geometry_tile = later.geometry_tile;
        }
    }
}

#[derive(Debug)]
pub struct TileWorker {
    id: OverscaledTileId,
    source_id: String,
    sprite_store: Arc<SpriteStore>,
    glyph_atlas: Arc<GlyphAtlas>,
    glyph_store: Arc<GlyphStore>,
    /// Set by the owner to abandon work; never written here.
    obsolete: Arc<AtomicBool>,
    mode: MapMode,
    worker_id: WorkerId,

    layers: Vec<StyleLayer>,
    geometry_tile: Option<Box<dyn GeometryTile>>,
    feature_index: Option<FeatureIndex>,
    /// Symbol buckets waiting on dependencies, keyed by layer position.
    pending: Vec<(usize, Bucket)>,
    /// Symbol buckets with features collected, waiting for placement.
    placement_pending: HashMap<String, Bucket>,
    partial_parse: bool,
    result: TileParseResult,
}

impl TileWorker {
    pub fn new(
        id: OverscaledTileId,
        source_id: &str,
        sprite_store: Arc<SpriteStore>,
        glyph_atlas: Arc<GlyphAtlas>,
        glyph_store: Arc<GlyphStore>,
        obsolete: Arc<AtomicBool>,
        mode: MapMode,
    ) -> Self {
        Self {
            id,
            source_id: source_id.to_string(),
            sprite_store,
            glyph_atlas,
            glyph_store,
            obsolete,
            mode,
            worker_id: WorkerId::next(),
            layers: Vec::new(),
            geometry_tile: None,
            feature_index: None,
            pending: Vec::new(),
            placement_pending: HashMap::new(),
            partial_parse: false,
            result: TileParseResult::default(),
        }
    }

    pub fn tile_id(&self) -> OverscaledTileId {
        self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Identity under which this worker reserves shared resources.
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn layers(&self) -> &[StyleLayer] {
        &self.layers
    }

    /// Ids of the style layers whose symbol buckets await dependencies.
    pub fn pending_layer_ids(&self) -> Vec<&str> {
        self.pending
            .iter()
            .map(|(index, _)| self.layers[*index].id.as_str())
            .collect()
    }

    fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Acquire)
    }

    /// Parse every layer of `layers` against `geometry_tile`, replacing any
    /// state from earlier calls.
    pub fn parse_all(
        &mut self,
        layers: Vec<StyleLayer>,
        geometry_tile: Box<dyn GeometryTile>,
        config: PlacementConfig,
    ) -> TileParseResult {
        self.layers = layers;
        self.geometry_tile = Some(geometry_tile);
        self.feature_index = Some(FeatureIndex::new(self.id));
        self.pending.clear();
        self.placement_pending.clear();
        self.partial_parse = false;
        self.result = TileParseResult::default();

        debug!(
            "Parsing {} layers of tile {} ({})",
            self.layers.len(),
            self.id,
            self.worker_id
        );

        // Later layers claim label space first.
        let mut parsed: HashSet<String> = HashSet::new();
        for index in (0..self.layers.len()).rev() {
            if self.is_obsolete() {
                debug!("Tile {} obsolete; abandoning parse", self.id);
                break;
            }

            let layer = &self.layers[index];
            let bucket_name = layer.bucket_name().to_string();
            if let Some(feature_index) = self.feature_index.as_mut() {
                feature_index.add_bucket_layer_name(&bucket_name, &layer.id);
            }
            if parsed.insert(bucket_name) {
                self.parse_layer(index);
            }
        }

        self.prepare_result(config)
    }

    fn parse_layer(&mut self, index: usize) {
        let layer = &self.layers[index];

        if layer.is_background() || layer.is_custom() {
            return;
        }
        if layer.source.as_deref() != Some(self.source_id.as_str())
            || !layer.in_zoom_band(self.id.overscaled_z)
            || !layer.visible
        {
            return;
        }

        let Some(tile) = self.geometry_tile.as_deref() else {
            return;
        };
        let source_layer = layer.source_layer.as_deref().unwrap_or_default();
        let Some(geometry_layer) = tile.layer(source_layer) else {
            if crate::debug::tile_parse_warnings() {
                warn!(
                    "Missing source layer '{}' for style layer '{}' in tile {}",
                    source_layer, layer.id, self.id
                );
            }
            return;
        };
        let Some(feature_index) = self.feature_index.as_mut() else {
            return;
        };

        let mut params = BucketParameters {
            tile_id: self.id,
            layer: geometry_layer,
            cancelled: &self.obsolete,
            worker_id: self.worker_id,
            partial_parse: &mut self.partial_parse,
            sprite_store: &self.sprite_store,
            glyph_atlas: &self.glyph_atlas,
            glyph_store: &self.glyph_store,
            feature_index,
            mode: self.mode,
        };
        let Some(bucket) = layer.create_bucket(&mut params) else {
            return;
        };

        if self.obsolete.load(Ordering::Acquire) {
            debug!("Discarding bucket '{}' of obsolete tile", layer.bucket_name());
            return;
        }

        if bucket.is_symbol() {
            if self.partial_parse {
                self.pending.push((index, bucket));
            } else {
                self.placement_pending
                    .insert(layer.bucket_name().to_string(), bucket);
            }
        } else if bucket.has_data() {
            self.result
                .buckets
                .insert(layer.bucket_name().to_string(), bucket);
        }
    }

    /// Retry the symbol buckets still waiting on dependencies.
    pub fn parse_pending(&mut self, config: PlacementConfig) -> TileParseResult {
        let pending = mem::take(&mut self.pending);
        let waiting = pending.len();

        for (index, mut bucket) in pending {
            let layer = &self.layers[index];
            let kind = bucket.kind_name();
            let Some(symbol) = bucket.as_symbol_mut() else {
                panic!(
                    "pending bucket of layer '{}' is a {} bucket; only symbol buckets may wait on dependencies",
                    layer.id, kind
                );
            };

            if symbol.needs_dependencies(&self.glyph_store, &self.sprite_store) {
                self.pending.push((index, bucket));
                continue;
            }

            symbol.add_features(
                self.worker_id,
                &self.sprite_store,
                &self.glyph_atlas,
                &self.glyph_store,
            );
            self.placement_pending
                .insert(layer.bucket_name().to_string(), bucket);
        }

        debug!(
            "Tile {}: resolved {} of {} pending symbol layers",
            self.id,
            waiting - self.pending.len(),
            waiting
        );
        self.prepare_result(config)
    }

    fn prepare_result(&mut self, config: PlacementConfig) -> TileParseResult {
        self.result.complete = self.pending.is_empty();

        if self.result.complete {
            // Placement runs once per parse; the index leaves with the
            // result that completes it.
            if let Some(mut feature_index) = self.feature_index.take() {
                feature_index.set_collision_tile(self.place_layers(config));
                self.result.feature_index = Some(feature_index);
                self.result.geometry_tile = self.geometry_tile.take();
            }
        }

        mem::take(&mut self.result)
    }

    fn place_layers(&mut self, config: PlacementConfig) -> CollisionTile {
        let mut buckets = mem::take(&mut self.placement_pending);
        let collision_tile = self.place_buckets(&mut buckets, config);

        for (name, mut bucket) in buckets {
            bucket.swap_render_data();
            if bucket.has_data() {
                self.result.buckets.insert(name, bucket);
            }
        }

        debug!(
            "Placed tile {}: {} collision boxes",
            self.id,
            collision_tile.len()
        );
        collision_tile
    }

    /// Re-place already resolved buckets under a new configuration and
    /// publish the result, without touching geometry.
    pub fn redo_placement(
        &self,
        buckets: &mut HashMap<String, Bucket>,
        config: PlacementConfig,
    ) -> CollisionTile {
        let collision_tile = self.place_buckets(buckets, config);
        for bucket in buckets.values_mut() {
            bucket.swap_render_data();
        }
        collision_tile
    }

    fn place_buckets(
        &self,
        buckets: &mut HashMap<String, Bucket>,
        config: PlacementConfig,
    ) -> CollisionTile {
        let mut collision_tile = CollisionTile::new(config);

        // A bucket shared by several layers is placed once, at the
        // priority of the last layer declaring it.
        let mut placed: HashSet<&str> = HashSet::new();
        for layer in self.layers.iter().rev() {
            let name = layer.bucket_name();
            if !placed.insert(name) {
                continue;
            }
            if let Some(bucket) = buckets.get_mut(name) {
                bucket.place_features(&mut collision_tile);
            }
        }

        collision_tile
    }
}

impl Drop for TileWorker {
    fn drop(&mut self) {
        self.glyph_atlas.remove_glyphs(self.worker_id);
        debug!("Tile {} worker dropped ({})", self.id, self.worker_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::FillBucket;
    use crate::tile::geometry::{GeometryFeature, GeometryTileLayer, VectorTileData};
    use glam::Vec2;

    fn worker() -> TileWorker {
        TileWorker::new(
            OverscaledTileId::native(3, 1, 2),
            "composite",
            Arc::new(SpriteStore::new()),
            Arc::new(GlyphAtlas::default()),
            Arc::new(GlyphStore::new()),
            Arc::new(AtomicBool::new(false)),
            MapMode::Continuous,
        )
    }

    fn land_tile() -> Box<dyn GeometryTile> {
        let square = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4096.0, 0.0),
            Vec2::new(4096.0, 4096.0),
            Vec2::new(0.0, 4096.0),
        ];
        Box::new(
            VectorTileData::new().with_layer(
                GeometryTileLayer::new("landuse").with_feature(GeometryFeature::polygon(vec![square])),
            ),
        )
    }

    #[test]
    fn test_worker_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<TileWorker>();
        assert_send::<TileParseResult>();
    }

    #[test]
    fn test_skips_background_and_foreign_sources() {
        let mut worker = worker();
        let layers = vec![
            StyleLayer::background("background"),
            StyleLayer::fill("land", "composite", "landuse"),
            StyleLayer::fill("other", "satellite", "landuse"),
            StyleLayer::custom("3d-models"),
        ];
        let result = worker.parse_all(layers, land_tile(), PlacementConfig::default());

        assert!(result.complete);
        assert_eq!(result.bucket_names(), ["land"]);
        let index = result.feature_index.unwrap();
        assert_eq!(index.layer_ids("background"), ["background"]);
        assert!(result.geometry_tile.is_some());
    }

    #[test]
    fn test_hidden_layers_and_missing_source_layers() {
        let mut worker = worker();
        let layers = vec![
            StyleLayer::fill("land", "composite", "landuse").with_visibility(false),
            StyleLayer::fill("water", "composite", "water"),
        ];
        let result = worker.parse_all(layers, land_tile(), PlacementConfig::default());
        assert!(result.complete);
        assert!(result.buckets.is_empty());
        assert_eq!(result.feature_index.unwrap().layer_ids("water"), ["water"]);
    }

    #[test]
    fn test_reparse_resets_state() {
        let mut worker = worker();
        let layers = vec![StyleLayer::fill("land", "composite", "landuse")];
        let first = worker.parse_all(layers.clone(), land_tile(), PlacementConfig::default());
        assert_eq!(first.buckets.len(), 1);

        let second = worker.parse_all(layers, land_tile(), PlacementConfig::default());
        assert!(second.complete);
        assert_eq!(second.buckets.len(), 1);
        assert_eq!(second.feature_index.unwrap().layer_ids("land").len(), 1);
    }

    #[test]
    #[should_panic(expected = "only symbol buckets")]
    fn test_non_symbol_pending_bucket_aborts() {
        let mut worker = worker();
        worker.layers = vec![StyleLayer::fill("land", "composite", "landuse")];
        worker.pending.push((0, Bucket::Fill(FillBucket::new())));
        worker.parse_pending(PlacementConfig::default());
    }

    #[test]
    fn test_drop_releases_glyphs_once() {
        let atlas = Arc::new(GlyphAtlas::default());
        let worker = TileWorker::new(
            OverscaledTileId::native(3, 1, 2),
            "composite",
            Arc::new(SpriteStore::new()),
            atlas.clone(),
            Arc::new(GlyphStore::new()),
            Arc::new(AtomicBool::new(false)),
            MapMode::Continuous,
        );
        drop(worker);
        assert_eq!(atlas.stats().releases, 1);
    }
}
