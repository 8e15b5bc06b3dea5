//! Tolerant field decoders.
//!
//! Records arrive from hand-edited exports and older form versions, so a
//! wrong-typed optional field falls back to its default instead of failing
//! the whole record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Text field: strings pass through, numbers and booleans are stringified.
pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Checkbox field: JSON booleans, non-zero numbers and "true"/"on"/"yes"/"1".
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(false, |v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "on" | "yes" | "1"
        ),
        _ => false,
    })
}

/// Monetary field: numbers or numeric strings; anything else is zero.
pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(value_to_amount(&Value::deserialize(deserializer)?))
}

/// Age in whole years; negative or unparseable values become zero.
pub fn years<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = value_to_amount(&Value::deserialize(deserializer)?);
    if value >= 0.0 && value <= u32::MAX as f64 {
        Ok(value.trunc() as u32)
    } else {
        Ok(0)
    }
}

fn value_to_amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}
