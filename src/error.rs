//! Central error handling for tileforge
//!
//! Errors only surface at the loading boundary (style documents, sprite
//! sheets, glyph ranges, placement configuration). Tile parsing itself
//! reports expected failures as data on the parse result.

pub use crate::config::ConfigError;
pub use crate::labels::glyphs::GlyphError;
pub use crate::style::parser::StyleError;
pub use crate::style::sprite::SpriteError;

/// Unified error type for everything that loads external input
#[derive(thiserror::Error, Debug)]
pub enum TileError {
    #[error("Style error: {0}")]
    Style(#[from] StyleError),

    #[error("Sprite error: {0}")]
    Sprite(#[from] SpriteError),

    #[error("Glyph error: {0}")]
    Glyph(#[from] GlyphError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TileError {
    /// Short category name, used as a log prefix
    pub fn category(&self) -> &'static str {
        match self {
            TileError::Style(_) => "Style",
            TileError::Sprite(_) => "Sprite",
            TileError::Glyph(_) => "Glyph",
            TileError::Config(_) => "Config",
        }
    }
}

/// Result type alias for loading operations
pub type TileResult<T> = Result<T, TileError>;
