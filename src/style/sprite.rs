//! Sprite sheet store for symbol icons.
//!
//! Styles reference a sprite base path that resolves to:
//! - `{sprite}.json` - JSON metadata with icon positions
//! - `{sprite}@2x.json` - High-DPI variant
//!
//! Until a sheet is loaded, icon dependencies of symbol buckets are unmet.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Error type for sprite operations.
#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Sprite not found: {0}")]
    NotFound(String),
}

/// A single sprite entry in the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteEntry {
    /// X position in sheet (pixels).
    pub x: u32,
    /// Y position in sheet (pixels).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel ratio (1 for standard, 2 for @2x).
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,
    /// Whether the sprite is an SDF (signed distance field).
    #[serde(default)]
    pub sdf: bool,
}

fn default_pixel_ratio() -> f32 {
    1.0
}

/// Icon lookup result used by symbol buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteIcon {
    /// Display width in CSS pixels.
    pub width: f32,
    /// Display height in CSS pixels.
    pub height: f32,
    /// UV coordinates [u0, v0, u1, v1] in the sheet.
    pub uv: [f32; 4],
    pub sdf: bool,
}

#[derive(Debug, Default)]
struct SpriteSheet {
    entries: HashMap<String, SpriteEntry>,
    width: u32,
    height: u32,
    loaded: bool,
}

/// Thread-safe sprite sheet shared by all tile workers.
#[derive(Debug, Default)]
pub struct SpriteStore {
    sheet: RwLock<SpriteSheet>,
}

impl SpriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.sheet
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded
    }

    /// Replace the sheet contents and mark the store loaded.
    pub fn set_sprites(&self, entries: HashMap<String, SpriteEntry>) {
        let width = entries.values().map(|e| e.x + e.width).max().unwrap_or(0);
        let height = entries.values().map(|e| e.y + e.height).max().unwrap_or(0);
        let count = entries.len();

        let mut sheet = self.sheet.write().unwrap_or_else(PoisonError::into_inner);
        *sheet = SpriteSheet {
            entries,
            width,
            height,
            loaded: true,
        };
        log::debug!("Loaded {} sprites ({}x{})", count, width, height);
    }

    /// Load sprite metadata from a JSON string.
    pub fn load_json(&self, json: &str) -> Result<(), SpriteError> {
        let entries: HashMap<String, SpriteEntry> = serde_json::from_str(json)?;
        self.set_sprites(entries);
        Ok(())
    }

    /// Load sprite metadata from `{base_path}.json`, preferring `@2x`.
    pub fn load(&self, base_path: &Path) -> Result<(), SpriteError> {
        let json_path = sprite_json_path(base_path);
        let content = fs::read_to_string(&json_path)?;
        self.load_json(&content)
    }

    /// True once the sheet is loaded. Names the sheet lacks are not
    /// dependencies; they simply render without an icon.
    pub fn has_icons(&self, names: &BTreeSet<String>) -> bool {
        names.is_empty() || self.is_loaded()
    }

    pub fn entry(&self, name: &str) -> Result<SpriteEntry, SpriteError> {
        self.sheet
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| SpriteError::NotFound(name.to_string()))
    }

    /// Icon size and sheet UVs for `name`.
    pub fn icon(&self, name: &str) -> Option<SpriteIcon> {
        let sheet = self.sheet.read().unwrap_or_else(PoisonError::into_inner);
        let entry = sheet.entries.get(name)?;
        if sheet.width == 0 || sheet.height == 0 {
            return None;
        }
        let ratio = if entry.pixel_ratio > 0.0 {
            entry.pixel_ratio
        } else {
            1.0
        };
        Some(SpriteIcon {
            width: entry.width as f32 / ratio,
            height: entry.height as f32 / ratio,
            uv: [
                entry.x as f32 / sheet.width as f32,
                entry.y as f32 / sheet.height as f32,
                (entry.x + entry.width) as f32 / sheet.width as f32,
                (entry.y + entry.height) as f32 / sheet.height as f32,
            ],
            sdf: entry.sdf,
        })
    }

    pub fn len(&self) -> usize {
        self.sheet
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sprite_json_path(base_path: &Path) -> PathBuf {
    if base_path.to_string_lossy().ends_with("@2x") {
        return base_path.with_extension("json");
    }
    let json_2x = PathBuf::from(format!("{}@2x.json", base_path.display()));
    if json_2x.exists() {
        json_2x
    } else {
        PathBuf::from(format!("{}.json", base_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"{
        "airport": {"x": 0, "y": 0, "width": 32, "height": 32},
        "harbor": {"x": 32, "y": 0, "width": 64, "height": 64, "pixel_ratio": 2}
    }"#;

    #[test]
    fn test_sprite_entry_serde() {
        let json = r#"{"x": 0, "y": 0, "width": 32, "height": 32}"#;
        let entry: SpriteEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.width, 32);
        assert_eq!(entry.pixel_ratio, 1.0);
        assert!(!entry.sdf);
    }

    #[test]
    fn test_unloaded_store_blocks_icons() {
        let store = SpriteStore::new();
        let names: BTreeSet<String> = ["airport".to_string()].into_iter().collect();
        assert!(!store.has_icons(&names));
        assert!(store.has_icons(&BTreeSet::new()));

        store.load_json(SHEET).unwrap();
        assert!(store.has_icons(&names));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_icon_uvs_and_ratio() {
        let store = SpriteStore::new();
        store.load_json(SHEET).unwrap();

        let airport = store.icon("airport").unwrap();
        assert!((airport.uv[2] - 32.0 / 96.0).abs() < 1e-6);
        assert!((airport.uv[3] - 0.5).abs() < 1e-6);

        let harbor = store.icon("harbor").unwrap();
        assert_eq!(harbor.width, 32.0);
        assert_eq!(harbor.height, 32.0);

        assert!(store.icon("missing").is_none());
        assert!(matches!(store.entry("missing"), Err(SpriteError::NotFound(_))));
    }
}
