//! Coercions for backend fields that may arrive as numbers or as numeric strings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Finite number from a JSON number or a numeric string. Blank strings are not numbers.
pub fn coerce_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|f| f.is_finite())
}

/// Identifier from a string or from an embedded document carrying `_id`.
pub fn coerce_id(v: &Value) -> Option<String> {
    let id = match v {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("_id").and_then(Value::as_str),
        _ => None,
    };
    id.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(coerce_number))
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings() {
        assert_eq!(coerce_number(&json!(12.5)), Some(12.5));
        assert_eq!(coerce_number(&json!(" 7 ")), Some(7.0));
        assert_eq!(coerce_number(&json!("")), None);
        assert_eq!(coerce_number(&json!("ten")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn ids_from_strings_or_embedded_documents() {
        assert_eq!(coerce_id(&json!("a1")), Some("a1".to_string()));
        assert_eq!(
            coerce_id(&json!({"_id": "a2", "tagId": "T-2"})),
            Some("a2".to_string())
        );
        assert_eq!(coerce_id(&json!({"tagId": "T-2"})), None);
        assert_eq!(coerce_id(&json!("  ")), None);
    }
}
