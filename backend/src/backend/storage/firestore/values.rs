//! Conversion between plain JSON and Firestore's typed value encoding
//! (`{"stringValue": "x"}`, `{"integerValue": "3"}`, ...).

use serde_json::{json, Map, Number, Value};

use crate::backend::storage::traits::Record;

/// Encode a plain JSON value as a Firestore `Value`
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode a record as a Firestore `fields` map
pub fn encode_fields(record: &Record) -> Value {
    let fields: Map<String, Value> = record
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(fields)
}

/// Decode a Firestore `Value` into plain JSON; unknown encodings become null
pub fn decode_value(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(n) => Value::Number(n.clone()),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(|v| v.as_array())
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Decode a Firestore `fields` map into a record
pub fn decode_fields(fields: &Value) -> Record {
    fields
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(name, value)| (name.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Quote a top-level field name for use in a field path when needed
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if simple && !name.is_empty() {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scalar_values() {
        assert_eq!(encode_value(&json!(3)), json!({"integerValue": "3"}));
        assert_eq!(encode_value(&json!(2.5)), json!({"doubleValue": 2.5}));
        assert_eq!(encode_value(&json!("Alice")), json!({"stringValue": "Alice"}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&json!(null)), json!({"nullValue": null}));
    }

    #[test]
    fn test_encode_nested_values() {
        let encoded = encode_value(&json!({"sizes": ["M", "L"], "team": {"name": "Owls"}}));
        assert_eq!(
            encoded,
            json!({"mapValue": {"fields": {
                "sizes": {"arrayValue": {"values": [{"stringValue": "M"}, {"stringValue": "L"}]}},
                "team": {"mapValue": {"fields": {"name": {"stringValue": "Owls"}}}}
            }}})
        );
    }

    #[test]
    fn test_decode_firestore_document_fields() {
        let fields = json!({
            "customerName": {"stringValue": "Alice"},
            "quantity": {"integerValue": "3"},
            "unitPrice": {"doubleValue": 24.5},
            "createdAt": {"timestampValue": "2024-01-01T00:00:00Z"},
            "tags": {"arrayValue": {}},
            "meta": {"mapValue": {}},
            "weird": {"somethingNew": 1}
        });
        let record = decode_fields(&fields);

        assert_eq!(record.get("customerName"), Some(&json!("Alice")));
        assert_eq!(record.get("quantity"), Some(&json!(3)));
        assert_eq!(record.get("unitPrice"), Some(&json!(24.5)));
        assert_eq!(record.get("createdAt"), Some(&json!("2024-01-01T00:00:00Z")));
        assert_eq!(record.get("tags"), Some(&json!([])));
        assert_eq!(record.get("meta"), Some(&json!({})));
        assert_eq!(record.get("weird"), Some(&Value::Null));
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("customerName"), "customerName");
        assert_eq!(field_path("_private"), "_private");
        assert_eq!(field_path("1st"), "`1st`");
        assert_eq!(field_path("team-name"), "`team-name`");
    }
}
