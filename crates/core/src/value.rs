//! Tagged value variant carried by every element in the graph.
//!
//! Payloads arrive as untyped JSON or raw bytes, so values use a sum type
//! that consumers pattern-match instead of a dynamic "any".

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A decoded payload value.
///
/// JSON rendering: `Bytes` serializes as base64 text, `Map` as an object,
/// `Number` as a JSON number. Deserialization from JSON never produces
/// `Bytes`; binary values only enter through codecs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// True if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the map variant, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the string variant, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of this value, if it is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True for `List` and `Map` variants.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Look up a key on a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from(json))
    }
}

/// Format a UTC instant as RFC 3339 with millisecond precision and a `Z`
/// offset, the wire form used throughout the API.
pub fn to_rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in the RFC 3339 wire form.
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Interpret a millisecond-since-epoch count as an RFC 3339 instant.
/// Out-of-range inputs fall back to the epoch.
pub fn format_timestamp_ms(millis: i64) -> String {
    let instant = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or(chrono::DateTime::UNIX_EPOCH);
    to_rfc3339(instant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_object() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a":1,"b":"x","c":[true,null]}"#).unwrap();
        let value = Value::from(json);
        assert_eq!(value.get("a").and_then(Value::as_number), Some(1.0));
        assert_eq!(value.get("b").and_then(Value::as_str), Some("x"));
        assert_eq!(
            value.get("c"),
            Some(&Value::List(vec![Value::Bool(true), Value::Null]))
        );
    }

    #[test]
    fn test_bytes_serialize_base64() {
        let value = Value::Bytes(vec![0x01, 0x02, 0xFF]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"AQL/\"");
    }

    #[test]
    fn test_null_serializes_as_null() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }

    #[test]
    fn test_format_timestamp_ms() {
        assert_eq!(format_timestamp_ms(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_timestamp_ms(1456), "1970-01-01T00:00:01.456Z");
    }
}
