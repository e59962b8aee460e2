//! Symbol bucket: text labels and icons placed with collision detection.
//!
//! Construction happens in phases:
//! 1. `parse_features` resolves text and icon names per feature and records
//!    the glyph ranges and icons they need.
//! 2. `add_features` runs once those are resident: text is shaped, glyphs
//!    are reserved in the atlas, and one instance is created per anchor.
//! 3. `place_features` claims collision space and stages render data with
//!    every instance flagged visible or hidden.
//! 4. `swap_render_data` publishes the staged data.

use std::collections::{BTreeSet, HashMap};
use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use log::debug;

use crate::bucket::{feature_passes, open_ring, BucketParameters, DependentBucket};
use crate::config::MapMode;
use crate::labels::atlas::GLYPH_BUFFER;
use crate::labels::{
    shape_text, CollisionTile, GlyphAtlas, GlyphPosition, GlyphRange, GlyphStore, SymbolRef,
    ONE_EM,
};
use crate::style::filter::FilterExpr;
use crate::style::layer::SymbolLayout;
use crate::style::sprite::SpriteStore;
use crate::tile::geometry::{FeatureType, GeometryFeature, EXTENT};
use crate::tile::{OverscaledTileId, WorkerId};

/// Symbol quad corner.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SymbolVertex {
    /// Anchor in tile pixels.
    pub anchor: [f32; 2],
    /// Corner offset from the anchor, in screen pixels.
    pub offset: [f32; 2],
    pub uv: [f32; 2],
    /// 1.0 when placed, 0.0 when hidden by collision.
    pub opacity: f32,
    pub _pad: f32,
}

/// Placement outcome of one symbol instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolPlacement {
    pub feature_index: usize,
    pub visible: bool,
}

/// Vertex data for one placement pass.
#[derive(Debug, Clone, Default)]
pub struct SymbolRenderData {
    pub text_vertices: Vec<SymbolVertex>,
    pub text_indices: Vec<u32>,
    pub icon_vertices: Vec<SymbolVertex>,
    pub icon_indices: Vec<u32>,
    pub placements: Vec<SymbolPlacement>,
}

impl SymbolRenderData {
    pub fn is_empty(&self) -> bool {
        self.text_vertices.is_empty() && self.icon_vertices.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.placements.iter().filter(|p| p.visible).count()
    }

    fn push_instance(&mut self, instance: &SymbolInstance, visible: bool) {
        let opacity = if visible { 1.0 } else { 0.0 };
        for quad in &instance.text_quads {
            push_quad(
                &mut self.text_vertices,
                &mut self.text_indices,
                instance.anchor,
                quad,
                opacity,
            );
        }
        if let Some(quad) = &instance.icon_quad {
            push_quad(
                &mut self.icon_vertices,
                &mut self.icon_indices,
                instance.anchor,
                quad,
                opacity,
            );
        }
        self.placements.push(SymbolPlacement {
            feature_index: instance.feature_index,
            visible,
        });
    }
}

fn push_quad(
    vertices: &mut Vec<SymbolVertex>,
    indices: &mut Vec<u32>,
    anchor: Vec2,
    quad: &Quad,
    opacity: f32,
) {
    let base = vertices.len() as u32;
    let [x0, y0, x1, y1] = quad.offsets;
    let [u0, v0, u1, v1] = quad.uv;
    for (offset, uv) in [
        ([x0, y0], [u0, v0]),
        ([x1, y0], [u1, v0]),
        ([x1, y1], [u1, v1]),
        ([x0, y1], [u0, v1]),
    ] {
        vertices.push(SymbolVertex {
            anchor: [anchor.x, anchor.y],
            offset,
            uv,
            opacity,
            _pad: 0.0,
        });
    }
    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

#[derive(Debug, Clone)]
struct SymbolFeature {
    index: usize,
    text: Option<String>,
    icon: Option<String>,
    /// Anchors in tile units.
    anchors: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy)]
struct Quad {
    /// Pixel offsets [x0, y0, x1, y1] from the anchor.
    offsets: [f32; 4],
    uv: [f32; 4],
}

#[derive(Debug, Clone)]
struct SymbolInstance {
    feature_index: usize,
    /// Anchor in tile pixels.
    anchor: Vec2,
    text_box: Option<[f32; 4]>,
    text_quads: Vec<Quad>,
    icon_box: Option<[f32; 4]>,
    icon_quad: Option<Quad>,
}

#[derive(Debug)]
pub struct SymbolBucket {
    bucket_name: String,
    source_layer: String,
    layout: SymbolLayout,
    mode: MapMode,
    pixels_per_unit: f32,
    features: Vec<SymbolFeature>,
    codepoints: BTreeSet<u32>,
    glyph_ranges: BTreeSet<GlyphRange>,
    icons: BTreeSet<String>,
    instances: Vec<SymbolInstance>,
    features_added: bool,
    staged: SymbolRenderData,
    published: SymbolRenderData,
}

impl SymbolBucket {
    pub fn new(
        bucket_name: &str,
        source_layer: &str,
        layout: SymbolLayout,
        tile_id: OverscaledTileId,
        mode: MapMode,
    ) -> Self {
        Self {
            bucket_name: bucket_name.to_string(),
            source_layer: source_layer.to_string(),
            layout,
            mode,
            pixels_per_unit: tile_id.pixels_per_unit(),
            features: Vec::new(),
            codepoints: BTreeSet::new(),
            glyph_ranges: BTreeSet::new(),
            icons: BTreeSet::new(),
            instances: Vec::new(),
            features_added: false,
            staged: SymbolRenderData::default(),
            published: SymbolRenderData::default(),
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn layout(&self) -> &SymbolLayout {
        &self.layout
    }

    /// Published render data.
    pub fn render_data(&self) -> &SymbolRenderData {
        &self.published
    }

    pub fn has_data(&self) -> bool {
        !self.published.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.published.visible_count()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn features_added(&self) -> bool {
        self.features_added
    }

    pub fn glyph_ranges(&self) -> &BTreeSet<GlyphRange> {
        &self.glyph_ranges
    }

    pub fn icon_names(&self) -> &BTreeSet<String> {
        &self.icons
    }

    /// Resolve text and icons of every feature passing `filter` and record
    /// what they depend on.
    pub fn parse_features(&mut self, params: &BucketParameters<'_>, filter: Option<&FilterExpr>) {
        for (index, feature) in params.layer.features.iter().enumerate() {
            if params.is_cancelled() {
                return;
            }
            if !feature_passes(filter, feature) {
                continue;
            }

            let text = self
                .layout
                .text_field
                .as_ref()
                .and_then(|field| field.resolve(&feature.properties));
            let icon = self
                .layout
                .icon_image
                .as_ref()
                .and_then(|field| field.resolve(&feature.properties));
            if text.is_none() && icon.is_none() {
                continue;
            }

            let anchors = feature_anchors(feature);
            if anchors.is_empty() {
                continue;
            }

            if let Some(text) = &text {
                self.codepoints.extend(text.chars().map(u32::from));
            }
            if let Some(icon) = &icon {
                self.icons.insert(icon.clone());
            }
            self.features.push(SymbolFeature {
                index,
                text,
                icon,
                anchors,
            });
        }
        self.glyph_ranges = GlyphRange::covering(&self.codepoints);
    }

    fn text_quads(
        &self,
        text: &str,
        glyph_store: &GlyphStore,
        positions: &HashMap<u32, GlyphPosition>,
    ) -> Option<([f32; 4], Vec<Quad>)> {
        let font = &self.layout.text_font;
        let shaping = shape_text(text, self.layout.text_letter_spacing, |cp| {
            glyph_store.glyph(font, cp)
        })?;

        let scale = self.layout.text_size / ONE_EM;
        let buffer = GLYPH_BUFFER as f32;
        // A label missing any atlas slot is dropped whole, so no collision
        // box is claimed for text that would not render.
        let quads = shaping
            .glyphs
            .iter()
            .map(|glyph| {
                let position = positions.get(&glyph.codepoint)?;
                let x0 = (glyph.x + glyph.metrics.left as f32 - buffer) * scale;
                let y0 = (glyph.y - glyph.metrics.top as f32 - buffer) * scale;
                Some(Quad {
                    offsets: [
                        x0,
                        y0,
                        x0 + position.rect[2] as f32 * scale,
                        y0 + position.rect[3] as f32 * scale,
                    ],
                    uv: position.uv,
                })
            })
            .collect::<Option<Vec<Quad>>>()?;
        Some((shaping.bounds_at(self.layout.text_size), quads))
    }

    fn icon_quad(&self, name: &str, sprite_store: &SpriteStore) -> Option<Quad> {
        let icon = sprite_store.icon(name)?;
        let half_w = icon.width * self.layout.icon_size / 2.0;
        let half_h = icon.height * self.layout.icon_size / 2.0;
        Some(Quad {
            offsets: [-half_w, -half_h, half_w, half_h],
            uv: icon.uv,
        })
    }
}

impl DependentBucket for SymbolBucket {
    fn needs_dependencies(&self, glyph_store: &GlyphStore, sprite_store: &SpriteStore) -> bool {
        // Query both stores so each records what it is missing.
        let glyphs_ready = self.glyph_ranges.is_empty()
            || glyph_store.has_glyph_ranges(&self.layout.text_font, &self.glyph_ranges);
        let icons_ready = sprite_store.has_icons(&self.icons);
        !(glyphs_ready && icons_ready)
    }

    fn add_features(
        &mut self,
        worker: WorkerId,
        sprite_store: &SpriteStore,
        glyph_atlas: &GlyphAtlas,
        glyph_store: &GlyphStore,
    ) {
        if self.features_added {
            return;
        }

        let positions = if self.codepoints.is_empty() {
            HashMap::new()
        } else {
            glyph_atlas.add_glyphs(worker, &self.layout.text_font, &self.codepoints, glyph_store)
        };

        let tile_size = EXTENT * self.pixels_per_unit;
        let avoid_edges = self.layout.symbol_avoid_edges || self.mode == MapMode::Still;
        let inside = |anchor: Vec2, offsets: Option<[f32; 4]>| {
            offsets.map_or(true, |[x0, y0, x1, y1]| {
                anchor.x + x0 >= 0.0
                    && anchor.y + y0 >= 0.0
                    && anchor.x + x1 <= tile_size
                    && anchor.y + y1 <= tile_size
            })
        };

        let mut instances = Vec::new();
        let mut dropped = 0usize;
        for feature in &self.features {
            let text = feature
                .text
                .as_deref()
                .and_then(|text| self.text_quads(text, glyph_store, &positions));
            let icon = feature
                .icon
                .as_deref()
                .and_then(|name| self.icon_quad(name, sprite_store));
            if text.is_none() && icon.is_none() {
                continue;
            }

            let text_box = text.as_ref().map(|(bounds, _)| *bounds);
            let icon_box = icon.map(|quad| quad.offsets);
            for &anchor in &feature.anchors {
                let anchor = anchor * self.pixels_per_unit;
                if avoid_edges && !(inside(anchor, text_box) && inside(anchor, icon_box)) {
                    dropped += 1;
                    continue;
                }
                instances.push(SymbolInstance {
                    feature_index: feature.index,
                    anchor,
                    text_box,
                    text_quads: text.as_ref().map(|(_, q)| q.clone()).unwrap_or_default(),
                    icon_box,
                    icon_quad: icon,
                });
            }
        }

        if dropped > 0 {
            debug!(
                "Dropped {} symbols crossing the tile edge in '{}'",
                dropped, self.bucket_name
            );
        }
        self.instances = instances;
        self.features_added = true;
    }

    fn place_features(&mut self, collision_tile: &mut CollisionTile) {
        let layout = &self.layout;
        let mut staged = SymbolRenderData::default();

        for instance in &self.instances {
            let text_bounds = instance
                .text_box
                .map(|offsets| collision_tile.screen_box(instance.anchor, offsets, layout.text_padding));
            let icon_bounds = instance
                .icon_box
                .map(|offsets| collision_tile.screen_box(instance.anchor, offsets, layout.icon_padding));

            let text_fits = text_bounds
                .map_or(true, |b| layout.text_allow_overlap || collision_tile.can_place(b));
            let icon_fits = icon_bounds
                .map_or(true, |b| layout.icon_allow_overlap || collision_tile.can_place(b));
            let visible = text_fits && icon_fits;

            let symbol = SymbolRef {
                bucket_name: self.bucket_name.clone(),
                source_layer: self.source_layer.clone(),
                feature_index: instance.feature_index,
            };
            for (bounds, ignore) in [
                (text_bounds, layout.text_ignore_placement),
                (icon_bounds, layout.icon_ignore_placement),
            ] {
                let Some(bounds) = bounds else {
                    continue;
                };
                collision_tile.record_debug(bounds, visible);
                if !visible {
                    continue;
                }
                if ignore {
                    collision_tile.insert_ignored(bounds, symbol.clone());
                } else {
                    collision_tile.insert(bounds, symbol.clone());
                }
            }

            staged.push_instance(instance, visible);
        }

        self.staged = staged;
    }

    fn swap_render_data(&mut self) {
        mem::swap(&mut self.staged, &mut self.published);
    }
}

/// Label anchors of a feature, in tile units. Anchors outside the tile are
/// left to the neighbouring tile.
fn feature_anchors(feature: &GeometryFeature) -> Vec<Vec2> {
    let candidates: Vec<Vec2> = match feature.feature_type {
        FeatureType::Point => feature.geometry.iter().flatten().copied().collect(),
        FeatureType::LineString => feature
            .geometry
            .iter()
            .filter_map(|line| line_midpoint(line))
            .collect(),
        FeatureType::Polygon => feature
            .geometry
            .first()
            .map(|ring| open_ring(ring))
            .filter(|ring| !ring.is_empty())
            .map(|ring| ring.iter().copied().sum::<Vec2>() / ring.len() as f32)
            .into_iter()
            .collect(),
        FeatureType::Unknown => Vec::new(),
    };

    candidates
        .into_iter()
        .filter(|p| p.x >= 0.0 && p.y >= 0.0 && p.x < EXTENT && p.y < EXTENT)
        .collect()
}

/// Point halfway along a path.
fn line_midpoint(line: &[Vec2]) -> Option<Vec2> {
    if line.len() < 2 {
        return line.first().copied();
    }
    let total: f32 = line.windows(2).map(|w| w[0].distance(w[1])).sum();
    let mut remaining = total / 2.0;
    for w in line.windows(2) {
        let length = w[0].distance(w[1]);
        if length > 0.0 && length >= remaining {
            return Some(w[0].lerp(w[1], remaining / length));
        }
        remaining -= length;
    }
    line.last().copied()
}
