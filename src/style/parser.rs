//! Mapbox Style Spec JSON parser.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::style::layer::StyleLayer;
use crate::style::types::{LayerType, StyleLayerDef, StyleSpec};

/// Error type for style parsing.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid style: {0}")]
    Invalid(String),
}

/// Parse a Mapbox GL Style Spec JSON file.
pub fn parse_style(path: &Path) -> Result<StyleSpec, StyleError> {
    let content = fs::read_to_string(path)?;
    parse_style_str(&content)
}

/// Parse a Mapbox GL Style Spec from a JSON string.
pub fn parse_style_str(json: &str) -> Result<StyleSpec, StyleError> {
    let spec: StyleSpec = serde_json::from_str(json)?;
    validate_style(&spec)?;
    Ok(spec)
}

/// Parse a style document straight into the layer stack for one source.
pub fn load_style_layers(json: &str, source_id: &str) -> Result<Vec<StyleLayer>, StyleError> {
    let spec = parse_style_str(json)?;
    Ok(spec.style_layers_for_source(source_id))
}

/// Validate a parsed style specification.
fn validate_style(spec: &StyleSpec) -> Result<(), StyleError> {
    if spec.version != 8 {
        return Err(StyleError::Invalid(format!(
            "Unsupported style version: {} (expected 8)",
            spec.version
        )));
    }

    let mut seen = HashSet::with_capacity(spec.layers.len());
    for layer in &spec.layers {
        if !seen.insert(layer.id.as_str()) {
            return Err(StyleError::Invalid(format!(
                "Duplicate layer id: {}",
                layer.id
            )));
        }
        if layer.layer_type == LayerType::Unknown {
            return Err(StyleError::Invalid(format!(
                "Unknown type for layer {}",
                layer.id
            )));
        }
    }
    Ok(())
}

impl StyleSpec {
    /// Find a layer by ID.
    pub fn layer_by_id(&self, id: &str) -> Option<&StyleLayerDef> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layers drawing from `source_id`, in paint order.
    pub fn layers_for_source(&self, source_id: &str) -> Vec<&StyleLayerDef> {
        self.layers
            .iter()
            .filter(|l| l.source.as_deref() == Some(source_id))
            .collect()
    }

    /// Resolved stack handed to the workers of one source. Background
    /// layers are kept; the worker skips them itself.
    pub fn style_layers_for_source(&self, source_id: &str) -> Vec<StyleLayer> {
        self.layers
            .iter()
            .filter(|l| l.source.is_none() || l.source.as_deref() == Some(source_id))
            .filter_map(StyleLayer::from_def)
            .collect()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
