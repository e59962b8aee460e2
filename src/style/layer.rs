//! Runtime style layers.
//!
//! A `StyleLayer` is the resolved form of a [`StyleLayerDef`]: defaults are
//! applied and layout properties the worker needs are pulled out into typed
//! fields. Layers are immutable once built; the worker owns its stack.

use log::debug;

use crate::bucket::{
    Bucket, BucketParameters, CircleBucket, DependentBucket, FillBucket, LineBucket, SymbolBucket,
};
use crate::style::filter::FilterExpr;
use crate::style::types::{FieldTemplate, LayerType, LayoutProps, StyleLayerDef};
use crate::tile::geometry::Properties;

/// Font stack used when a symbol layer names none.
pub const DEFAULT_FONT_STACK: &str = "Open Sans Regular,Arial Unicode MS Regular";

/// Layout of a symbol layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLayout {
    pub text_field: Option<FieldTemplate>,
    /// Comma-joined font stack, the key used by glyph stores.
    pub text_font: String,
    /// Font size in pixels.
    pub text_size: f32,
    /// Extra spacing between glyphs, in ems.
    pub text_letter_spacing: f32,
    /// Collision padding around text, in pixels.
    pub text_padding: f32,
    pub text_allow_overlap: bool,
    pub text_ignore_placement: bool,
    pub icon_image: Option<FieldTemplate>,
    /// Icon scale factor.
    pub icon_size: f32,
    pub icon_padding: f32,
    pub icon_allow_overlap: bool,
    pub icon_ignore_placement: bool,
    /// Drop symbols that would cross the tile edge.
    pub symbol_avoid_edges: bool,
}

impl Default for SymbolLayout {
    fn default() -> Self {
        Self {
            text_field: None,
            text_font: DEFAULT_FONT_STACK.to_string(),
            text_size: 16.0,
            text_letter_spacing: 0.0,
            text_padding: 2.0,
            text_allow_overlap: false,
            text_ignore_placement: false,
            icon_image: None,
            icon_size: 1.0,
            icon_padding: 2.0,
            icon_allow_overlap: false,
            icon_ignore_placement: false,
            symbol_avoid_edges: false,
        }
    }
}

impl SymbolLayout {
    pub fn from_props(layout: &LayoutProps) -> Self {
        let defaults = Self::default();
        Self {
            text_field: layout.text_field.clone(),
            text_font: layout
                .text_font
                .as_ref()
                .filter(|fonts| !fonts.is_empty())
                .map(|fonts| fonts.join(","))
                .unwrap_or(defaults.text_font),
            text_size: layout
                .text_size
                .as_ref()
                .and_then(|v| v.as_f32())
                .unwrap_or(defaults.text_size),
            text_letter_spacing: layout
                .text_letter_spacing
                .unwrap_or(defaults.text_letter_spacing),
            text_padding: layout.text_padding.unwrap_or(defaults.text_padding),
            text_allow_overlap: layout.text_allow_overlap.unwrap_or(false),
            text_ignore_placement: layout.text_ignore_placement.unwrap_or(false),
            icon_image: layout.icon_image.clone(),
            icon_size: layout
                .icon_size
                .as_ref()
                .and_then(|v| v.as_f32())
                .unwrap_or(defaults.icon_size),
            icon_padding: layout.icon_padding.unwrap_or(defaults.icon_padding),
            icon_allow_overlap: layout.icon_allow_overlap.unwrap_or(false),
            icon_ignore_placement: layout.icon_ignore_placement.unwrap_or(false),
            symbol_avoid_edges: layout.symbol_avoid_edges.unwrap_or(false),
        }
    }

    pub fn with_text_field(mut self, template: &str) -> Self {
        self.text_field = Some(FieldTemplate::String(template.to_string()));
        self
    }

    pub fn with_text_font(mut self, font_stack: &str) -> Self {
        self.text_font = font_stack.to_string();
        self
    }

    pub fn with_text_size(mut self, size: f32) -> Self {
        self.text_size = size;
        self
    }

    pub fn with_icon_image(mut self, template: &str) -> Self {
        self.icon_image = Some(FieldTemplate::String(template.to_string()));
        self
    }

    pub fn with_allow_overlap(mut self, allow: bool) -> Self {
        self.text_allow_overlap = allow;
        self.icon_allow_overlap = allow;
        self
    }

    pub fn with_ignore_placement(mut self, ignore: bool) -> Self {
        self.text_ignore_placement = ignore;
        self.icon_ignore_placement = ignore;
        self
    }

    pub fn with_avoid_edges(mut self, avoid: bool) -> Self {
        self.symbol_avoid_edges = avoid;
        self
    }
}

/// Closed set of layer kinds the worker distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Background,
    /// Opaque pass-through layer rendered by the host; never bucketed.
    Custom,
    Fill,
    Line,
    Circle,
    Symbol(SymbolLayout),
}

/// A resolved style layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleLayer {
    pub id: String,
    pub kind: LayerKind,
    pub source: Option<String>,
    pub source_layer: Option<String>,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub visible: bool,
    pub filter: Option<FilterExpr>,
    /// Paint properties, carried for the renderer.
    pub paint: Properties,
    bucket_name: Option<String>,
}

impl StyleLayer {
    pub fn new(id: &str, kind: LayerKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            source: None,
            source_layer: None,
            min_zoom: f32::NEG_INFINITY,
            max_zoom: f32::INFINITY,
            visible: true,
            filter: None,
            paint: Properties::new(),
            bucket_name: None,
        }
    }

    pub fn background(id: &str) -> Self {
        Self::new(id, LayerKind::Background)
    }

    pub fn custom(id: &str) -> Self {
        Self::new(id, LayerKind::Custom)
    }

    pub fn fill(id: &str, source: &str, source_layer: &str) -> Self {
        Self::new(id, LayerKind::Fill).with_source(source, source_layer)
    }

    pub fn line(id: &str, source: &str, source_layer: &str) -> Self {
        Self::new(id, LayerKind::Line).with_source(source, source_layer)
    }

    pub fn circle(id: &str, source: &str, source_layer: &str) -> Self {
        Self::new(id, LayerKind::Circle).with_source(source, source_layer)
    }

    pub fn symbol(id: &str, source: &str, source_layer: &str, layout: SymbolLayout) -> Self {
        Self::new(id, LayerKind::Symbol(layout)).with_source(source, source_layer)
    }

    /// Resolve a document layer. Returns `None` for layer types this
    /// worker does not build buckets for.
    pub fn from_def(def: &StyleLayerDef) -> Option<Self> {
        let kind = match def.layer_type {
            LayerType::Background => LayerKind::Background,
            LayerType::Fill => LayerKind::Fill,
            LayerType::Line => LayerKind::Line,
            LayerType::Circle => LayerKind::Circle,
            LayerType::Symbol => LayerKind::Symbol(SymbolLayout::from_props(&def.layout)),
            LayerType::Raster
            | LayerType::Hillshade
            | LayerType::FillExtrusion
            | LayerType::Unknown => {
                debug!("Skipping layer '{}' of type {:?}", def.id, def.layer_type);
                return None;
            }
        };

        Some(Self {
            id: def.id.clone(),
            kind,
            source: def.source.clone(),
            source_layer: def.source_layer.clone(),
            min_zoom: def.minzoom.unwrap_or(f32::NEG_INFINITY),
            max_zoom: def.maxzoom.unwrap_or(f32::INFINITY),
            visible: def.layout.visibility.as_deref() != Some("none"),
            filter: def.filter.clone(),
            paint: def.paint.clone(),
            bucket_name: def.bucket.clone(),
        })
    }

    pub fn with_source(mut self, source: &str, source_layer: &str) -> Self {
        self.source = Some(source.to_string());
        self.source_layer = Some(source_layer.to_string());
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Share a bucket with every other layer using the same name.
    pub fn with_bucket_name(mut self, name: &str) -> Self {
        self.bucket_name = Some(name.to_string());
        self
    }

    /// Sharing key for buckets; defaults to the layer id.
    pub fn bucket_name(&self) -> &str {
        self.bucket_name.as_deref().unwrap_or(&self.id)
    }

    pub fn is_background(&self) -> bool {
        matches!(self.kind, LayerKind::Background)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, LayerKind::Custom)
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.kind, LayerKind::Symbol(_))
    }

    /// Whether the layer draws at an integer render zoom.
    ///
    /// The band is half-open on the rounded-up bounds, so a layer with
    /// zoom range 2.5..4.2 draws at 3 and 4 only. The lower bound is
    /// rounded up, not down: a layer whose range starts at 2.5 must not
    /// draw at zoom 2.
    pub fn in_zoom_band(&self, zoom: u8) -> bool {
        let zoom = f32::from(zoom);
        zoom >= self.min_zoom.ceil() && zoom < self.max_zoom.ceil()
    }

    /// Build this layer's bucket from the parameters' geometry layer.
    ///
    /// Background and custom layers produce nothing. Symbol buckets only
    /// collect their features when every dependency is resident; once one
    /// symbol layer of a pass is missing dependencies, `partial_parse`
    /// stays set and later symbol layers are deferred too.
    pub fn create_bucket(&self, params: &mut BucketParameters<'_>) -> Option<Bucket> {
        let filter = self.filter.as_ref();
        let bucket = match &self.kind {
            LayerKind::Background | LayerKind::Custom => return None,
            LayerKind::Fill => {
                let mut bucket = FillBucket::new();
                bucket.populate(params, self.bucket_name(), filter);
                Bucket::Fill(bucket)
            }
            LayerKind::Line => {
                let mut bucket = LineBucket::new();
                bucket.populate(params, self.bucket_name(), filter);
                Bucket::Line(bucket)
            }
            LayerKind::Circle => {
                let mut bucket = CircleBucket::new();
                bucket.populate(params, self.bucket_name(), filter);
                Bucket::Circle(bucket)
            }
            LayerKind::Symbol(layout) => {
                let mut bucket = SymbolBucket::new(
                    self.bucket_name(),
                    &params.layer.name,
                    layout.clone(),
                    params.tile_id,
                    params.mode,
                );
                bucket.parse_features(params, filter);

                if bucket.needs_dependencies(params.glyph_store, params.sprite_store) {
                    *params.partial_parse = true;
                }
                if !*params.partial_parse {
                    bucket.add_features(
                        params.worker_id,
                        params.sprite_store,
                        params.glyph_atlas,
                        params.glyph_store,
                    );
                }
                Bucket::Symbol(bucket)
            }
        };
        Some(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(value: serde_json::Value) -> StyleLayerDef {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_zoom_band_rounding() {
        let layer = StyleLayer::fill("land", "composite", "landuse").with_zoom_range(2.5, 4.2);
        assert!(!layer.in_zoom_band(2));
        assert!(layer.in_zoom_band(3));
        assert!(layer.in_zoom_band(4));
        assert!(!layer.in_zoom_band(5));
    }

    #[test]
    fn test_unbounded_zoom_band() {
        let layer = StyleLayer::fill("land", "composite", "landuse");
        assert!(layer.in_zoom_band(0));
        assert!(layer.in_zoom_band(22));
    }

    #[test]
    fn test_bucket_name_defaults_to_id() {
        let layer = StyleLayer::line("roads", "composite", "road");
        assert_eq!(layer.bucket_name(), "roads");
        let shared = layer.with_bucket_name("road-casing");
        assert_eq!(shared.bucket_name(), "road-casing");
    }

    #[test]
    fn test_from_def_symbol_layout() {
        let layer = StyleLayer::from_def(&def(json!({
            "id": "poi-label",
            "type": "symbol",
            "source": "composite",
            "source-layer": "poi",
            "minzoom": 12,
            "layout": {
                "text-field": "{name}",
                "text-font": ["Noto Sans Regular", "Arial Unicode MS Regular"],
                "text-size": 14,
                "icon-image": "{maki}-15",
                "symbol-avoid-edges": true
            }
        })))
        .unwrap();

        assert!(layer.is_symbol());
        assert_eq!(layer.min_zoom, 12.0);
        let LayerKind::Symbol(layout) = &layer.kind else {
            panic!("expected symbol layout");
        };
        assert_eq!(layout.text_font, "Noto Sans Regular,Arial Unicode MS Regular");
        assert_eq!(layout.text_size, 14.0);
        assert_eq!(layout.text_padding, 2.0);
        assert!(layout.symbol_avoid_edges);
        assert!(layout.icon_image.is_some());
    }

    #[test]
    fn test_from_def_hidden_and_shared() {
        let layer = StyleLayer::from_def(&def(json!({
            "id": "road-casing",
            "type": "line",
            "source": "composite",
            "source-layer": "road",
            "bucket": "road",
            "layout": {"visibility": "none"}
        })))
        .unwrap();
        assert!(!layer.visible);
        assert_eq!(layer.bucket_name(), "road");
    }

    #[test]
    fn test_from_def_skips_raster() {
        let raster = def(json!({"id": "satellite", "type": "raster", "source": "imagery"}));
        assert!(StyleLayer::from_def(&raster).is_none());
    }
}
