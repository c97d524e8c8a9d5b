//! JSON output through serde_json
//!
//! Values convert into [`serde_json::Value`] with placeholders written back in
//! intrinsic form. serde_json is built with `preserve_order`, so mapping keys
//! keep their insertion order and the same document always gives the same text.

use serde_json::{Map, Number, Value as Json};

use super::value::{Mapping, Value};

impl From<&Value> for Json {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::Sequence(items) => Json::Array(items.iter().map(Json::from).collect()),
            Value::Mapping(m) => Json::from(m),
            Value::Placeholder(p) => Json::from(&p.to_intrinsic()),
        }
    }
}

impl From<&Mapping> for Json {
    fn from(mapping: &Mapping) -> Self {
        Json::Object(
            mapping
                .iter()
                .map(|(key, value)| (key.clone(), Json::from(value)))
                .collect::<Map<_, _>>(),
        )
    }
}

/// Integral numbers are written without a fraction; JSON has no NaN or infinity
fn number(n: f64) -> Json {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Json::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

/// Pretty-print a value as JSON with two-space indentation
pub fn to_json(value: &Value) -> String {
    serde_json::to_string_pretty(&Json::from(value)).unwrap_or_default()
}

pub(crate) fn mapping_to_json(mapping: &Mapping) -> String {
    serde_json::to_string_pretty(&Json::from(mapping)).unwrap_or_default()
}

/// Single-line JSON, used for event records
pub fn to_json_compact(value: &Value) -> String {
    serde_json::to_string(&Json::from(value)).unwrap_or_default()
}
