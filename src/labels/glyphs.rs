//! Glyph metrics store shared by all tile workers.
//!
//! Glyphs are fetched in 256-codepoint ranges per font stack. Workers ask
//! whether the ranges they need are resident; the answer is immediate, and
//! any missing range is recorded so the orchestrator knows what to fetch.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Error type for glyph range loading.
#[derive(Debug, thiserror::Error)]
pub enum GlyphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Glyph {codepoint} outside range {range}")]
    OutOfRange { codepoint: u32, range: String },
}

/// A 256-codepoint glyph range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphRange {
    /// Start codepoint (inclusive).
    pub start: u32,
    /// End codepoint (inclusive).
    pub end: u32,
}

impl GlyphRange {
    /// Range containing `cp`.
    pub fn from_codepoint(cp: u32) -> Self {
        let start = (cp / 256) * 256;
        Self {
            start,
            end: start + 255,
        }
    }

    pub fn contains(&self, cp: u32) -> bool {
        (self.start..=self.end).contains(&cp)
    }

    /// Metrics file name for this range, e.g. "0-255.json".
    pub fn filename(&self) -> String {
        format!("{}-{}.json", self.start, self.end)
    }

    /// Distinct ranges covering every codepoint in `codepoints`.
    pub fn covering<'a>(codepoints: impl IntoIterator<Item = &'a u32>) -> BTreeSet<GlyphRange> {
        codepoints
            .into_iter()
            .map(|cp| GlyphRange::from_codepoint(*cp))
            .collect()
    }
}

impl std::fmt::Display for GlyphRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Metrics of one SDF glyph, in pixels at 24px font size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlyphMetrics {
    /// Codepoint.
    pub id: u32,
    /// Bitmap width.
    pub width: u32,
    /// Bitmap height.
    pub height: u32,
    /// Left bearing.
    pub left: i32,
    /// Top bearing.
    pub top: i32,
    /// Horizontal advance.
    pub advance: u32,
}

#[derive(Debug, Deserialize)]
struct GlyphRangeFile {
    glyphs: Vec<GlyphMetrics>,
}

#[derive(Debug, Default)]
struct FontStackGlyphs {
    loaded: BTreeSet<GlyphRange>,
    glyphs: HashMap<u32, GlyphMetrics>,
}

/// Thread-safe store of loaded glyph ranges keyed by font stack.
#[derive(Debug, Default)]
pub struct GlyphStore {
    stacks: RwLock<HashMap<String, FontStackGlyphs>>,
    requested: Mutex<BTreeSet<(String, GlyphRange)>>,
}

impl GlyphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every range in `ranges` is loaded for `font_stack`.
    ///
    /// Missing ranges are remembered as requested; see
    /// [`GlyphStore::take_requested_ranges`].
    pub fn has_glyph_ranges(&self, font_stack: &str, ranges: &BTreeSet<GlyphRange>) -> bool {
        let missing: Vec<GlyphRange> = {
            let stacks = self.stacks.read().unwrap_or_else(PoisonError::into_inner);
            match stacks.get(font_stack) {
                Some(stack) => ranges
                    .iter()
                    .filter(|range| !stack.loaded.contains(range))
                    .copied()
                    .collect(),
                None => ranges.iter().copied().collect(),
            }
        };

        if missing.is_empty() {
            return true;
        }

        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        for range in missing {
            requested.insert((font_stack.to_string(), range));
        }
        false
    }

    /// Mark `range` as loaded for `font_stack` with the given glyphs.
    pub fn add_glyph_range(
        &self,
        font_stack: &str,
        range: GlyphRange,
        glyphs: Vec<GlyphMetrics>,
    ) -> Result<(), GlyphError> {
        if let Some(outside) = glyphs.iter().find(|g| !range.contains(g.id)) {
            return Err(GlyphError::OutOfRange {
                codepoint: outside.id,
                range: range.to_string(),
            });
        }

        {
            let mut stacks = self.stacks.write().unwrap_or_else(PoisonError::into_inner);
            let stack = stacks.entry(font_stack.to_string()).or_default();
            stack.loaded.insert(range);
            stack.glyphs.extend(glyphs.into_iter().map(|g| (g.id, g)));
        }

        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(font_stack.to_string(), range));
        log::debug!("Loaded glyph range {} for '{}'", range, font_stack);
        Ok(())
    }

    /// Load a range from JSON metrics: `{"glyphs": [{"id": 65, ...}, ...]}`.
    pub fn load_glyph_range_json(
        &self,
        font_stack: &str,
        range: GlyphRange,
        json: &str,
    ) -> Result<(), GlyphError> {
        let file: GlyphRangeFile = serde_json::from_str(json)?;
        self.add_glyph_range(font_stack, range, file.glyphs)
    }

    /// Load a range from a JSON metrics file on disk.
    pub fn load_glyph_range_file(
        &self,
        font_stack: &str,
        range: GlyphRange,
        path: &Path,
    ) -> Result<(), GlyphError> {
        let content = fs::read_to_string(path)?;
        self.load_glyph_range_json(font_stack, range, &content)
    }

    pub fn glyph(&self, font_stack: &str, codepoint: u32) -> Option<GlyphMetrics> {
        let stacks = self.stacks.read().unwrap_or_else(PoisonError::into_inner);
        stacks.get(font_stack)?.glyphs.get(&codepoint).copied()
    }

    /// Drain the set of ranges workers asked for but did not find.
    pub fn take_requested_ranges(&self) -> Vec<(String, GlyphRange)> {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *requested).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(id: u32) -> GlyphMetrics {
        GlyphMetrics {
            id,
            width: 10,
            height: 14,
            left: 1,
            top: -4,
            advance: 12,
        }
    }

    #[test]
    fn test_glyph_range() {
        let range = GlyphRange::from_codepoint(65);
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 255);
        assert_eq!(range.filename(), "0-255.json");

        let range = GlyphRange::from_codepoint(0x4E00);
        assert_eq!(range.start, 19712);
        assert_eq!(range.filename(), "19712-19967.json");
    }

    #[test]
    fn test_covering_ranges() {
        let codepoints: BTreeSet<u32> = [65, 66, 0x4E00].into_iter().collect();
        let ranges = GlyphRange::covering(&codepoints);
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn test_missing_ranges_are_requested() {
        let store = GlyphStore::new();
        let ranges: BTreeSet<_> = [GlyphRange::from_codepoint(65)].into_iter().collect();

        assert!(!store.has_glyph_ranges("Open Sans Regular", &ranges));
        let requested = store.take_requested_ranges();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].0, "Open Sans Regular");
        assert!(store.take_requested_ranges().is_empty());

        store
            .add_glyph_range("Open Sans Regular", GlyphRange::from_codepoint(0), vec![metrics(65)])
            .unwrap();
        assert!(store.has_glyph_ranges("Open Sans Regular", &ranges));
        assert_eq!(store.glyph("Open Sans Regular", 65), Some(metrics(65)));
        assert_eq!(store.glyph("Open Sans Bold", 65), None);
    }

    #[test]
    fn test_load_json_range() {
        let store = GlyphStore::new();
        let json = r#"{"glyphs": [{"id": 72, "width": 11, "height": 15, "left": 1, "top": -5, "advance": 13}]}"#;
        store
            .load_glyph_range_json("Noto Sans", GlyphRange::from_codepoint(0), json)
            .unwrap();
        assert_eq!(store.glyph("Noto Sans", 72).map(|g| g.advance), Some(13));
    }

    #[test]
    fn test_rejects_glyph_outside_range() {
        let store = GlyphStore::new();
        let result = store.add_glyph_range("Noto Sans", GlyphRange::from_codepoint(0), vec![metrics(300)]);
        assert!(matches!(result, Err(GlyphError::OutOfRange { codepoint: 300, .. })));
    }
}
