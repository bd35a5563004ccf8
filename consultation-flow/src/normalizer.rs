//! Normalizes recommendation payloads of unknown shape into an ordered list
//! of `(name, confidence)` entries.
//!
//! The service has sent predictions as an array of pairs, as a mapping, and as
//! either of those encoded inside a JSON string. The shape is detected at
//! runtime and each variant has its own decoder.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::PredictionEntry;

/// Runtime classification of a raw prediction payload
#[derive(Debug)]
pub enum RawPredictions<'a> {
    /// `[["name", value], ...]`
    Pairs(&'a [Value]),
    /// A string that may hold JSON-encoded pairs or a mapping
    Encoded(&'a str),
    /// `{"name": value, ...}`
    Mapping(&'a Map<String, Value>),
    Unsupported,
}

impl<'a> RawPredictions<'a> {
    pub fn classify(raw: &'a Value) -> Self {
        match raw {
            Value::Array(items) => RawPredictions::Pairs(items),
            Value::String(encoded) => RawPredictions::Encoded(encoded),
            Value::Object(map) => RawPredictions::Mapping(map),
            _ => RawPredictions::Unsupported,
        }
    }
}

/// Normalizes any payload shape. Never fails: unusable input yields an empty list.
pub fn normalize(raw: &Value) -> Vec<PredictionEntry> {
    match RawPredictions::classify(raw) {
        RawPredictions::Pairs(items) => decode_pairs(items),
        RawPredictions::Encoded(encoded) => decode_encoded(encoded),
        RawPredictions::Mapping(map) => decode_mapping(map),
        RawPredictions::Unsupported => {
            debug!(payload = %raw, "Unsupported prediction payload");
            Vec::new()
        }
    }
}

/// Same as [`normalize`] for a field that may be absent
pub fn normalize_optional(raw: Option<&Value>) -> Vec<PredictionEntry> {
    raw.map(normalize).unwrap_or_default()
}

fn decode_pairs(items: &[Value]) -> Vec<PredictionEntry> {
    items
        .iter()
        .filter_map(|item| match item.as_array().map(Vec::as_slice) {
            Some([name, value]) => Some(PredictionEntry::new(
                coerce_name(name),
                coerce_number(value),
            )),
            _ => {
                warn!(item = %item, "Skipping prediction that is not a (name, value) pair");
                None
            }
        })
        .collect()
}

fn decode_encoded(encoded: &str) -> Vec<PredictionEntry> {
    let decoded: Value = match serde_json::from_str(encoded) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Could not decode prediction string");
            return Vec::new();
        }
    };

    match RawPredictions::classify(&decoded) {
        RawPredictions::Pairs(items) => decode_pairs(items),
        RawPredictions::Mapping(map) => decode_mapping(map),
        // a string inside a string is not unwrapped any further
        RawPredictions::Encoded(_) | RawPredictions::Unsupported => Vec::new(),
    }
}

fn decode_mapping(map: &Map<String, Value>) -> Vec<PredictionEntry> {
    map.iter()
        .map(|(name, value)| PredictionEntry::new(name.clone(), coerce_number(value)))
        .collect()
}

/// String conversion of a dynamic value: strings as-is, everything else as JSON text
pub fn coerce_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric conversion of a dynamic value. Non-numeric input becomes NaN
/// instead of being rejected.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}
