//! Legacy feature filters (subset of Mapbox filter syntax).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tile::geometry::{FeatureType, Properties};

/// Filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    /// Array-based expression.
    Array(Vec<Value>),
    /// Boolean literal.
    Bool(bool),
}

impl FilterExpr {
    /// Evaluate filter against a feature.
    pub fn evaluate(&self, feature_type: FeatureType, properties: &Properties) -> bool {
        match self {
            FilterExpr::Bool(b) => *b,
            FilterExpr::Array(arr) => evaluate_filter_array(arr, feature_type, properties),
        }
    }
}

fn lookup(key: &str, feature_type: FeatureType, props: &Properties) -> Option<Value> {
    if key == "$type" {
        return Some(Value::String(feature_type.filter_name().to_string()));
    }
    props.get(key).cloned()
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn evaluate_filter_array(arr: &[Value], feature_type: FeatureType, props: &Properties) -> bool {
    if arr.is_empty() {
        return true;
    }

    let op = match arr[0].as_str() {
        Some(s) => s,
        None => return true,
    };
    let key = arr.get(1).and_then(Value::as_str).unwrap_or("");
    let sub = |v: &Value| {
        v.as_array()
            .map(|a| evaluate_filter_array(a, feature_type, props))
    };

    match op {
        "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            if arr.len() != 3 {
                return true;
            }
            let expected = &arr[2];
            let actual = lookup(key, feature_type, props);
            match op {
                "==" => actual.as_ref() == Some(expected),
                "!=" => actual.as_ref() != Some(expected),
                _ => {
                    let Some(ordering) = actual.and_then(|v| compare(&v, expected)) else {
                        return false;
                    };
                    match op {
                        "<" => ordering == Ordering::Less,
                        "<=" => ordering != Ordering::Greater,
                        ">" => ordering == Ordering::Greater,
                        _ => ordering != Ordering::Less,
                    }
                }
            }
        }
        "in" | "!in" => {
            if arr.len() < 2 {
                return true;
            }
            let found = lookup(key, feature_type, props)
                .map(|val| arr[2..].iter().any(|v| *v == val))
                .unwrap_or(false);
            if op == "in" {
                found
            } else {
                !found
            }
        }
        "has" => arr.len() != 2 || lookup(key, feature_type, props).is_some(),
        "!has" => arr.len() != 2 || lookup(key, feature_type, props).is_none(),
        "all" => arr[1..].iter().all(|v| sub(v).unwrap_or(true)),
        "any" => arr[1..].iter().any(|v| sub(v).unwrap_or(false)),
        "none" => !arr[1..].iter().any(|v| sub(v).unwrap_or(false)),
        "!" | "not" => arr.get(1).and_then(|v| sub(v)).map(|r| !r).unwrap_or(true),
        // Unknown operators pass through
        _ => true,
    }
}
