//! Mapbox Style Spec import module.
//!
//! Parses Mapbox GL style JSON (version 8) into the ordered layer stack the
//! tile worker consumes, and holds the sprite sheet used by symbol icons.
//!
//! Supported layer types:
//! - `fill`, `line`, `circle`: single-pass buckets
//! - `symbol`: text and icons, built in two phases
//! - `background`: kept in the stack, never bucketed
//!
//! See <https://docs.mapbox.com/mapbox-gl-js/style-spec/> for full spec.

pub mod filter;
pub mod layer;
pub mod parser;
pub mod sprite;
pub mod types;

pub use filter::FilterExpr;
pub use layer::{LayerKind, StyleLayer, SymbolLayout, DEFAULT_FONT_STACK};
pub use parser::{load_style_layers, parse_style, parse_style_str, StyleError};
pub use sprite::{SpriteEntry, SpriteError, SpriteIcon, SpriteStore};
pub use types::{FieldTemplate, LayerType, LayoutProps, NumberValue, StyleLayerDef, StyleSpec};
