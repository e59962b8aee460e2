//! tileforge: vector tile parsing core.
//!
//! Turns a decoded vector tile plus an ordered stack of style layers into
//! render-ready buckets. Symbol buckets wait on shared glyph and sprite
//! stores and are placed against a per-pass collision tile.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! use tileforge::{
//!     GlyphAtlas, GlyphStore, MapMode, OverscaledTileId, PlacementConfig, SpriteStore,
//!     StyleLayer, TileWorker, VectorTileData,
//! };
//!
//! let mut worker = TileWorker::new(
//!     OverscaledTileId::native(14, 8192, 5461),
//!     "composite",
//!     Arc::new(SpriteStore::new()),
//!     Arc::new(GlyphAtlas::default()),
//!     Arc::new(GlyphStore::new()),
//!     Arc::new(AtomicBool::new(false)),
//!     MapMode::Continuous,
//! );
//! let layers = vec![StyleLayer::fill("land", "composite", "landuse")];
//! let result = worker.parse_all(layers, Box::new(VectorTileData::new()), PlacementConfig::default());
//! if !result.complete {
//!     // Fetch the requested glyphs, then call `parse_pending`.
//! }
//! ```

pub mod bucket;
pub mod config;
pub mod debug;
pub mod error;
pub mod labels;
pub mod resources;
pub mod style;
pub mod tile;

pub use bucket::{Bucket, DependentBucket, SymbolBucket};
pub use config::{MapMode, PlacementConfig};
pub use error::{TileError, TileResult};
pub use labels::{CollisionTile, GlyphAtlas, GlyphRange, GlyphStore};
pub use resources::TileResources;
pub use style::{load_style_layers, LayerKind, SpriteStore, StyleLayer, SymbolLayout};
pub use tile::{
    FeatureIndex, GeometryFeature, GeometryTile, GeometryTileLayer, OverscaledTileId,
    TileParseResult, TileWorker, VectorTileData,
};
