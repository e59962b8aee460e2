//! Stores shared by every tile worker of one map.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::debug;

use crate::config::MapMode;
use crate::error::TileResult;
use crate::labels::{GlyphAtlas, GlyphStore};
use crate::style::SpriteStore;
use crate::tile::{OverscaledTileId, TileWorker};

#[derive(Debug, Clone, Default)]
pub struct TileResources {
    pub sprites: Arc<SpriteStore>,
    pub glyph_atlas: Arc<GlyphAtlas>,
    pub glyphs: Arc<GlyphStore>,
}

impl TileResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the sprite sheet metadata at `{base}.json`.
    pub fn load_sprites(&self, base: &Path) -> TileResult<()> {
        self.sprites.load(base)?;
        Ok(())
    }

    /// Load every glyph range workers asked for from
    /// `{dir}/{font stack}/{start}-{end}.json`.
    ///
    /// Returns the number of ranges loaded. Ranges without a file are
    /// skipped; a worker still missing them asks again on its next pass.
    pub fn load_requested_glyphs(&self, dir: &Path) -> TileResult<usize> {
        let mut loaded = 0;
        for (font_stack, range) in self.glyphs.take_requested_ranges() {
            let path = dir.join(&font_stack).join(range.filename());
            if !path.is_file() {
                debug!("No glyph file for '{}' {}", font_stack, range);
                continue;
            }
            self.glyphs.load_glyph_range_file(&font_stack, range, &path)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Create a worker for `tile_id` that shares these stores.
    pub fn worker(
        &self,
        tile_id: OverscaledTileId,
        source_id: &str,
        obsolete: Arc<AtomicBool>,
        mode: MapMode,
    ) -> TileWorker {
        TileWorker::new(
            tile_id,
            source_id,
            self.sprites.clone(),
            self.glyph_atlas.clone(),
            self.glyphs.clone(),
            obsolete,
            mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TileError;
    use crate::labels::GlyphRange;
    use std::collections::BTreeSet;
    use std::fs;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("tileforge-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_requested_glyphs() {
        let dir = scratch_dir("glyphs");
        fs::create_dir_all(dir.join("Noto Sans")).unwrap();
        fs::write(
            dir.join("Noto Sans").join("0-255.json"),
            r#"{"glyphs": [{"id": 65, "width": 10, "height": 12, "left": 0, "top": -4, "advance": 12}]}"#,
        )
        .unwrap();

        let resources = TileResources::new();
        let latin: BTreeSet<_> = [GlyphRange::from_codepoint(65)].into_iter().collect();
        let cjk: BTreeSet<_> = [GlyphRange::from_codepoint(0x4E00)].into_iter().collect();
        assert!(!resources.glyphs.has_glyph_ranges("Noto Sans", &latin));
        assert!(!resources.glyphs.has_glyph_ranges("Noto Sans", &cjk));

        assert_eq!(resources.load_requested_glyphs(&dir).unwrap(), 1);
        assert!(resources.glyphs.has_glyph_ranges("Noto Sans", &latin));
        assert!(resources.glyphs.glyph("Noto Sans", 65).is_some());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_sprite_sheet() {
        let dir = scratch_dir("sprites");
        let err = TileResources::new()
            .load_sprites(&dir.join("sprite"))
            .unwrap_err();
        assert!(matches!(err, TileError::Sprite(_)));
        assert_eq!(err.category(), "Sprite");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_workers_share_stores() {
        let resources = TileResources::new();
        let obsolete = Arc::new(AtomicBool::new(false));
        let a = resources.worker(
            OverscaledTileId::native(3, 1, 1),
            "composite",
            obsolete.clone(),
            MapMode::Continuous,
        );
        let b = resources.worker(
            OverscaledTileId::native(3, 1, 2),
            "composite",
            obsolete,
            MapMode::Continuous,
        );
        assert_ne!(a.worker_id(), b.worker_id());
        drop(a);
        drop(b);
        assert_eq!(resources.glyph_atlas.stats().releases, 2);
    }
}
