//! Tile parsing: geometry input, worker orchestration and the feature index.

pub mod feature_index;
pub mod geometry;
pub mod id;
pub mod worker;

pub use feature_index::{FeatureHit, FeatureIndex, IndexedFeature};
pub use geometry::{
    FeatureType, GeometryFeature, GeometryTile, GeometryTileLayer, Properties, VectorTileData,
    EXTENT, TILE_SIZE,
};
pub use id::{OverscaledTileId, WorkerId};
pub use worker::{TileParseResult, TileWorker};
