//! Buckets: render-ready geometry built from one style layer.
//!
//! Fill, line and circle buckets are built in a single pass. Symbol buckets
//! depend on glyphs and icons and go through [`DependentBucket`]: features
//! are collected once dependencies are resident, then placed against a
//! collision tile and published.

pub mod circle;
pub mod fill;
pub mod line;
pub mod symbol;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::MapMode;
use crate::labels::{CollisionTile, GlyphAtlas, GlyphStore};
use crate::style::filter::FilterExpr;
use crate::style::sprite::SpriteStore;
use crate::tile::feature_index::FeatureIndex;
use crate::tile::geometry::{GeometryFeature, GeometryTileLayer};
use crate::tile::{OverscaledTileId, WorkerId};

pub use circle::{CircleBucket, CircleVertex};
pub use fill::{FillBucket, FillVertex};
pub use line::{LineBucket, LineVertex};
pub use symbol::{SymbolBucket, SymbolPlacement, SymbolRenderData, SymbolVertex};

/// Error raised while converting one feature's geometry.
///
/// Never escapes bucket construction: the feature is logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Ring has {found} points (need at least {required})")]
    TooFewPoints { found: usize, required: usize },
    #[error("Tessellation failed: {0}")]
    Tessellation(String),
}

/// Everything a style layer needs to build its bucket.
pub struct BucketParameters<'a> {
    pub tile_id: OverscaledTileId,
    pub layer: &'a GeometryTileLayer,
    pub cancelled: &'a AtomicBool,
    pub worker_id: WorkerId,
    /// Set once a symbol layer of the current pass lacks dependencies.
    pub partial_parse: &'a mut bool,
    pub sprite_store: &'a SpriteStore,
    pub glyph_atlas: &'a GlyphAtlas,
    pub glyph_store: &'a GlyphStore,
    pub feature_index: &'a mut FeatureIndex,
    pub mode: MapMode,
}

impl BucketParameters<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Two-phase construction for buckets whose features depend on glyphs and
/// icons.
pub trait DependentBucket {
    /// True while any glyph range or icon the bucket references is missing.
    fn needs_dependencies(&self, glyph_store: &GlyphStore, sprite_store: &SpriteStore) -> bool;

    /// Shape and collect features once dependencies are resident. Glyphs are
    /// reserved in the atlas on behalf of `worker`.
    fn add_features(
        &mut self,
        worker: WorkerId,
        sprite_store: &SpriteStore,
        glyph_atlas: &GlyphAtlas,
        glyph_store: &GlyphStore,
    );

    /// Claim collision space and stage render data.
    fn place_features(&mut self, collision_tile: &mut CollisionTile);

    /// Publish staged render data.
    fn swap_render_data(&mut self);
}

/// A renderable unit built from one style layer's geometry.
#[derive(Debug)]
pub enum Bucket {
    Fill(FillBucket),
    Line(LineBucket),
    Circle(CircleBucket),
    Symbol(SymbolBucket),
}

impl Bucket {
    /// Empty buckets are dropped rather than emitted.
    pub fn has_data(&self) -> bool {
        match self {
            Bucket::Fill(b) => b.has_data(),
            Bucket::Line(b) => b.has_data(),
            Bucket::Circle(b) => b.has_data(),
            Bucket::Symbol(b) => b.has_data(),
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Bucket::Symbol(_))
    }

    pub fn as_symbol(&self) -> Option<&SymbolBucket> {
        match self {
            Bucket::Symbol(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_symbol_mut(&mut self) -> Option<&mut SymbolBucket> {
        match self {
            Bucket::Symbol(b) => Some(b),
            _ => None,
        }
    }

    /// Only symbol buckets ever wait on dependencies.
    pub fn needs_dependencies(&self, glyph_store: &GlyphStore, sprite_store: &SpriteStore) -> bool {
        match self {
            Bucket::Symbol(b) => b.needs_dependencies(glyph_store, sprite_store),
            _ => false,
        }
    }

    /// No-op for buckets without collision-aware features.
    pub fn place_features(&mut self, collision_tile: &mut CollisionTile) {
        if let Bucket::Symbol(b) = self {
            b.place_features(collision_tile);
        }
    }

    pub fn swap_render_data(&mut self) {
        if let Bucket::Symbol(b) = self {
            b.swap_render_data();
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Bucket::Fill(_) => "fill",
            Bucket::Line(_) => "line",
            Bucket::Circle(_) => "circle",
            Bucket::Symbol(_) => "symbol",
        }
    }
}

/// Whether `feature` passes the layer filter, if any.
pub(crate) fn feature_passes(filter: Option<&FilterExpr>, feature: &GeometryFeature) -> bool {
    filter.map_or(true, |f| f.evaluate(feature.feature_type, &feature.properties))
}

/// Drop a closing point that repeats the first one.
pub(crate) fn open_ring(ring: &[glam::Vec2]) -> &[glam::Vec2] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use serde_json::json;

    #[test]
    fn test_open_ring() {
        let ring = vec![
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::ZERO,
        ];
        assert_eq!(open_ring(&ring).len(), 3);
        assert_eq!(open_ring(&ring[..3]).len(), 3);
        assert!(open_ring(&[]).is_empty());
    }

    #[test]
    fn test_feature_passes() {
        let feature = GeometryFeature::point(Vec2::ZERO).with_property("class", "park");
        let filter: FilterExpr = serde_json::from_value(json!(["==", "class", "park"])).unwrap();
        let other: FilterExpr = serde_json::from_value(json!(["==", "class", "pier"])).unwrap();
        assert!(feature_passes(None, &feature));
        assert!(feature_passes(Some(&filter), &feature));
        assert!(!feature_passes(Some(&other), &feature));
    }

    #[test]
    fn test_simple_buckets_never_wait() {
        let bucket = Bucket::Fill(FillBucket::new());
        assert!(!bucket.needs_dependencies(&GlyphStore::new(), &SpriteStore::new()));
        assert!(!bucket.is_symbol());
        assert!(!bucket.has_data());
        assert_eq!(bucket.kind_name(), "fill");
    }
}
