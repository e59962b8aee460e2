//! Single-line text shaping from glyph advances.

use crate::labels::glyphs::GlyphMetrics;

/// Font size glyph metrics are authored at.
pub const ONE_EM: f32 = 24.0;

/// A glyph positioned relative to the label anchor, in `ONE_EM` units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedGlyph {
    pub codepoint: u32,
    pub x: f32,
    pub y: f32,
    pub metrics: GlyphMetrics,
}

/// Result of shaping one label.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaping {
    pub glyphs: Vec<PositionedGlyph>,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Shaping {
    /// Bounds `[x0, y0, x1, y1]` in pixels for a given font size.
    pub fn bounds_at(&self, text_size: f32) -> [f32; 4] {
        let scale = text_size / ONE_EM;
        [
            self.left * scale,
            self.top * scale,
            self.right * scale,
            self.bottom * scale,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Lay `text` out on one line, centred on the anchor.
///
/// Characters without metrics are skipped. Returns `None` when no glyph
/// could be placed.
pub fn shape_text(
    text: &str,
    letter_spacing: f32,
    lookup: impl Fn(u32) -> Option<GlyphMetrics>,
) -> Option<Shaping> {
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor = 0.0f32;

    for ch in text.chars() {
        let cp = ch as u32;
        let Some(metrics) = lookup(cp) else {
            continue;
        };
        glyphs.push(PositionedGlyph {
            codepoint: cp,
            x: cursor,
            y: 0.0,
            metrics,
        });
        cursor += metrics.advance as f32 + letter_spacing * ONE_EM;
    }

    if glyphs.is_empty() {
        return None;
    }

    // Trailing spacing does not count toward the width.
    let width = cursor - letter_spacing * ONE_EM;
    let shift = -width / 2.0;
    for glyph in &mut glyphs {
        glyph.x += shift;
        glyph.y -= ONE_EM / 2.0;
    }

    Some(Shaping {
        glyphs,
        left: shift,
        top: -ONE_EM / 2.0,
        right: shift + width,
        bottom: ONE_EM / 2.0,
    })
}
