//! Style document types (Mapbox GL Style Spec, version 8 subset).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::style::filter::FilterExpr;
use crate::tile::geometry::Properties;

/// Complete style document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSpec {
    /// Style version (always 8 for Mapbox GL).
    #[serde(default = "default_version")]
    pub version: u32,
    /// Style name.
    #[serde(default)]
    pub name: String,
    /// Style layers in paint order.
    #[serde(default)]
    pub layers: Vec<StyleLayerDef>,
    /// Data sources (informational, not parsed in detail).
    #[serde(default)]
    pub sources: Value,
    /// Sprite URL (optional).
    #[serde(default)]
    pub sprite: Option<String>,
    /// Glyphs URL template (optional).
    #[serde(default)]
    pub glyphs: Option<String>,
}

fn default_version() -> u32 {
    8
}

/// A single style layer as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleLayerDef {
    /// Unique layer ID.
    pub id: String,
    /// Layer type.
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    /// Source ID (for data layers).
    #[serde(default)]
    pub source: Option<String>,
    /// Source layer name (for vector tile sources).
    #[serde(rename = "source-layer")]
    #[serde(default)]
    pub source_layer: Option<String>,
    /// Paint properties, passed through untouched to the renderer.
    #[serde(default)]
    pub paint: Properties,
    /// Layout properties.
    #[serde(default)]
    pub layout: LayoutProps,
    #[serde(default)]
    pub filter: Option<FilterExpr>,
    #[serde(default)]
    pub minzoom: Option<f32>,
    #[serde(default)]
    pub maxzoom: Option<f32>,
    /// Shared bucket name. Layers naming the same bucket are parsed once.
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Layer types in the style spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Fill,
    Line,
    Circle,
    Symbol,
    Background,
    Raster,
    Hillshade,
    FillExtrusion,
    #[serde(other)]
    Unknown,
}

/// Layout properties used by tile parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutProps {
    /// Visibility ("visible" or "none").
    pub visibility: Option<String>,
    #[serde(rename = "text-field")]
    pub text_field: Option<FieldTemplate>,
    #[serde(rename = "text-font")]
    pub text_font: Option<Vec<String>>,
    #[serde(rename = "text-size")]
    pub text_size: Option<NumberValue>,
    #[serde(rename = "text-letter-spacing")]
    pub text_letter_spacing: Option<f32>,
    #[serde(rename = "text-padding")]
    pub text_padding: Option<f32>,
    #[serde(rename = "text-allow-overlap")]
    pub text_allow_overlap: Option<bool>,
    #[serde(rename = "text-ignore-placement")]
    pub text_ignore_placement: Option<bool>,
    #[serde(rename = "icon-image")]
    pub icon_image: Option<FieldTemplate>,
    #[serde(rename = "icon-size")]
    pub icon_size: Option<NumberValue>,
    #[serde(rename = "icon-padding")]
    pub icon_padding: Option<f32>,
    #[serde(rename = "icon-allow-overlap")]
    pub icon_allow_overlap: Option<bool>,
    #[serde(rename = "icon-ignore-placement")]
    pub icon_ignore_placement: Option<bool>,
    #[serde(rename = "symbol-avoid-edges")]
    pub symbol_avoid_edges: Option<bool>,
}

/// Number value - a literal or an expression we do not evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberValue {
    Number(f32),
    Expression(Value),
}

impl NumberValue {
    /// Get literal value or None for expressions.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            NumberValue::Number(n) => Some(*n),
            NumberValue::Expression(_) => None,
        }
    }
}

/// Property template: `"{name}"`-style string or `["get", "name"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldTemplate {
    String(String),
    Expression(Value),
}

impl FieldTemplate {
    /// Substitute feature properties. Returns `None` for an empty result.
    pub fn resolve(&self, properties: &Properties) -> Option<String> {
        let text = match self {
            FieldTemplate::String(template) => substitute(template, properties),
            FieldTemplate::Expression(expr) => {
                let arr = expr.as_array()?;
                match (arr.first().and_then(Value::as_str), arr.get(1).and_then(Value::as_str)) {
                    (Some("get"), Some(key)) => properties.get(key).map(value_to_string)?,
                    _ => return None,
                }
            }
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn substitute(template: &str, properties: &Properties) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                if let Some(value) = properties.get(key) {
                    out.push_str(&value_to_string(value));
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props() -> Properties {
        let mut props = Properties::new();
        props.insert("name".to_string(), json!("Pier 39"));
        props.insert("ref".to_string(), json!(39));
        props
    }

    #[test]
    fn test_template_substitution() {
        let template = FieldTemplate::String("{name} ({ref})".to_string());
        assert_eq!(template.resolve(&props()).as_deref(), Some("Pier 39 (39)"));
    }

    #[test]
    fn test_missing_property_resolves_empty() {
        let template = FieldTemplate::String("{name_en}".to_string());
        assert_eq!(template.resolve(&props()), None);
    }

    #[test]
    fn test_get_expression() {
        let template = FieldTemplate::Expression(json!(["get", "name"]));
        assert_eq!(template.resolve(&props()).as_deref(), Some("Pier 39"));
        let other = FieldTemplate::Expression(json!(["upcase", "name"]));
        assert_eq!(other.resolve(&props()), None);
    }

    #[test]
    fn test_layer_type_names() {
        let t: LayerType = serde_json::from_str(r#""fill-extrusion""#).unwrap();
        assert_eq!(t, LayerType::FillExtrusion);
        let t: LayerType = serde_json::from_str(r#""heatmap""#).unwrap();
        assert_eq!(t, LayerType::Unknown);
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let template = FieldTemplate::String("{name".to_string());
        assert_eq!(template.resolve(&props()).as_deref(), Some("{name"));
    }
}
