//! Parse a style document and run its layer stack through a worker.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use glam::Vec2;
use tileforge::labels::GlyphMetrics;
use tileforge::{
    load_style_layers, GeometryFeature, GeometryTileLayer, GlyphAtlas, GlyphRange, GlyphStore,
    MapMode, OverscaledTileId, PlacementConfig, SpriteStore, TileWorker, VectorTileData,
};

const STYLE: &str = r#"{
    "version": 8,
    "name": "Harbor",
    "sources": {"composite": {"type": "vector"}},
    "layers": [
        {"id": "background", "type": "background"},
        {"id": "hillshade", "type": "hillshade", "source": "terrain"},
        {"id": "satellite", "type": "raster", "source": "composite"},
        {
            "id": "water", "type": "fill", "source": "composite",
            "source-layer": "water", "bucket": "water"
        },
        {
            "id": "water-outline", "type": "line", "source": "composite",
            "source-layer": "water"
        },
        {
            "id": "water-shadow", "type": "fill", "source": "composite",
            "source-layer": "water", "bucket": "water"
        },
        {
            "id": "parks", "type": "fill", "source": "composite",
            "source-layer": "landuse", "filter": ["==", "class", "park"],
            "minzoom": 12
        },
        {
            "id": "hidden", "type": "circle", "source": "composite",
            "source-layer": "poi", "layout": {"visibility": "none"}
        },
        {
            "id": "poi-label", "type": "symbol", "source": "composite",
            "source-layer": "poi",
            "layout": {"text-field": "{name}", "text-font": ["Noto Sans Regular"], "text-size": 12}
        }
    ]
}"#;

fn square(min: f32, max: f32) -> Vec<Vec2> {
    vec![
        Vec2::new(min, min),
        Vec2::new(max, min),
        Vec2::new(max, max),
        Vec2::new(min, max),
    ]
}

fn tile() -> VectorTileData {
    VectorTileData::new()
        .with_layer(
            GeometryTileLayer::new("water")
                .with_feature(GeometryFeature::polygon(vec![square(100.0, 2000.0)])),
        )
        .with_layer(
            GeometryTileLayer::new("landuse")
                .with_feature(
                    GeometryFeature::polygon(vec![square(3000.0, 5000.0)])
                        .with_property("class", "park"),
                )
                .with_feature(
                    GeometryFeature::polygon(vec![square(6000.0, 7000.0)])
                        .with_property("class", "cemetery"),
                ),
        )
        .with_layer(
            GeometryTileLayer::new("poi").with_feature(
                GeometryFeature::point(Vec2::new(4096.0, 4096.0)).with_property("name", "Pier"),
            ),
        )
}

#[test]
fn style_document_drives_parse() {
    let _ = env_logger::builder().is_test(true).try_init();

    let layers = load_style_layers(STYLE, "composite").unwrap();
    let ids: Vec<&str> = layers.iter().map(|l| l.id.as_str()).collect();
    // Raster-like layers are dropped; sourceless layers are kept.
    assert_eq!(
        ids,
        [
            "background",
            "water",
            "water-outline",
            "water-shadow",
            "parks",
            "hidden",
            "poi-label"
        ]
    );

    let glyphs = Arc::new(GlyphStore::new());
    let mut worker = TileWorker::new(
        OverscaledTileId::native(14, 8192, 5461),
        "composite",
        Arc::new(SpriteStore::new()),
        Arc::new(GlyphAtlas::default()),
        glyphs.clone(),
        Arc::new(AtomicBool::new(false)),
        MapMode::Continuous,
    );

    let mut result = worker.parse_all(layers, Box::new(tile()), PlacementConfig::default());
    assert!(!result.complete);
    assert_eq!(result.bucket_names(), ["parks", "water", "water-outline"]);

    let metrics = (32u32..127)
        .map(|id| GlyphMetrics {
            id,
            width: 10,
            height: 12,
            left: 0,
            top: -4,
            advance: 12,
        })
        .collect();
    glyphs
        .add_glyph_range("Noto Sans Regular", GlyphRange::from_codepoint(80), metrics)
        .unwrap();

    result.merge(worker.parse_pending(PlacementConfig::default()));
    assert!(result.complete);
    assert_eq!(
        result.bucket_names(),
        ["parks", "poi-label", "water", "water-outline"]
    );

    let index = result.feature_index.as_ref().unwrap();
    let mut water = index.layer_ids("water").to_vec();
    water.sort();
    assert_eq!(water, ["water", "water-shadow"]);
    assert!(index.layer_ids("hidden").contains(&"hidden".to_string()));

    // Only the park passed the filter.
    let hits = index.query([6500.0, 6500.0, 6600.0, 6600.0]);
    assert!(hits.is_empty());
    let hits = index.query([4000.0, 4000.0, 4100.0, 4100.0]);
    assert!(hits.contains_key("parks"));
    assert!(hits.contains_key("poi-label"));
}

#[test]
fn malformed_style_is_rejected() {
    assert!(load_style_layers(r#"{"version": 7, "layers": []}"#, "composite").is_err());
    let duplicate = r#"{"version": 8, "layers": [
        {"id": "a", "type": "fill", "source": "composite"},
        {"id": "a", "type": "line", "source": "composite"}
    ]}"#;
    assert!(load_style_layers(duplicate, "composite").is_err());
}
