//! Label support: glyph storage, the shared glyph atlas, text shaping and
//! collision placement.

pub mod atlas;
pub mod collision;
pub mod glyphs;
pub mod shaping;

pub use atlas::{GlyphAtlas, GlyphAtlasStats, GlyphPosition};
pub use collision::{CollisionBox, CollisionTile, DebugBox, SymbolRef};
pub use glyphs::{GlyphError, GlyphMetrics, GlyphRange, GlyphStore};
pub use shaping::{shape_text, PositionedGlyph, Shaping, ONE_EM};
