//! Schema mapper: turns a matched, decoded message into the canonical
//! identifiers and the value/timestamp/quality triple.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use i3x_core::config::MappingConfig;
use i3x_core::{format_timestamp_ms, to_rfc3339, Value};

use crate::path;

/// The primary entity produced from one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedPrimary {
    pub element_id: String,
    pub value: Value,
    pub timestamp: String,
    pub quality: Option<String>,
    pub namespace_uri: String,
    pub type_id: String,
    pub display_name: String,
}

/// Literal substitution of `{key}` with the captured segment. Missing keys
/// render as empty; no escaping, no nested templates.
pub fn render_template(template: &str, captures: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close_rel) => {
                let close = open + close_rel;
                out.push_str(&rest[..open]);
                let key = &rest[open + 1..close];
                if let Some(segment) = captures.get(key) {
                    out.push_str(segment);
                }
                rest = &rest[close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Map one decoded message onto the information model.
pub fn map_message(
    rule: &MappingConfig,
    topic: &str,
    captures: &HashMap<String, String>,
    decoded: &Value,
    receive_time: DateTime<Utc>,
) -> MappedPrimary {
    let element_id = match &rule.element_id_template {
        Some(template) => render_template(template, captures),
        None => topic.replace('/', "."),
    };

    let value = rule
        .value_expr
        .as_deref()
        .and_then(|expr| path::evaluate(decoded, expr))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| decoded.clone());

    let timestamp = rule
        .timestamp_expr
        .as_deref()
        .and_then(|expr| path::evaluate(decoded, expr))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_timestamp_ms(*n as i64)),
            _ => None,
        })
        .unwrap_or_else(|| to_rfc3339(receive_time));

    let quality = rule
        .quality_expr
        .as_deref()
        .and_then(|expr| path::evaluate(decoded, expr))
        .and_then(|v| v.as_str().map(str::to_string));

    let namespace_uri = match &rule.namespace_uri {
        Some(template) => render_template(template, captures),
        None => captures
            .get("namespace")
            .cloned()
            .unwrap_or_else(|| "urn:default".to_string()),
    };

    let type_id = match &rule.object_type_id {
        Some(template) => render_template(template, captures),
        None => "GenericTag".to_string(),
    };

    let display_name = match &rule.display_name_template {
        Some(template) => render_template(template, captures),
        None => element_id.clone(),
    };

    MappedPrimary {
        element_id,
        value,
        timestamp,
        quality,
        namespace_uri,
        type_id,
        display_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn receive_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_render_template() {
        let caps = captures(&[("site", "f1"), ("id", "s01")]);
        assert_eq!(render_template("temp.{site}.{id}", &caps), "temp.f1.s01");
        // Missing keys render as empty.
        assert_eq!(render_template("a.{nope}.b", &caps), "a..b");
        // Unclosed brace is literal.
        assert_eq!(render_template("x{open", &caps), "x{open");
    }

    #[test]
    fn test_element_id_defaults_to_dotted_topic() {
        let rule = MappingConfig::default();
        let mapped = map_message(
            &rule,
            "f1/sensors/temp",
            &HashMap::new(),
            &Value::Number(1.0),
            receive_time(),
        );
        assert_eq!(mapped.element_id, "f1.sensors.temp");
        assert_eq!(mapped.display_name, "f1.sensors.temp");
        assert_eq!(mapped.namespace_uri, "urn:default");
        assert_eq!(mapped.type_id, "GenericTag");
    }

    #[test]
    fn test_value_and_timestamp_extraction() {
        let rule = MappingConfig {
            value_expr: Some("$.temperature".to_string()),
            timestamp_expr: Some("$.ts".to_string()),
            quality_expr: Some("$.q".to_string()),
            ..Default::default()
        };
        let decoded = Value::from(serde_json::json!({
            "temperature": 23.5,
            "ts": "2026-02-02T10:30:45.123Z",
            "status": "ok"
        }));
        let mapped = map_message(&rule, "t", &HashMap::new(), &decoded, receive_time());
        assert_eq!(mapped.value, Value::Number(23.5));
        // Source timestamp strings pass through untouched.
        assert_eq!(mapped.timestamp, "2026-02-02T10:30:45.123Z");
        assert_eq!(mapped.quality, None);
    }

    #[test]
    fn test_numeric_timestamp_is_ms_since_epoch() {
        let rule = MappingConfig {
            timestamp_expr: Some("$.ts".to_string()),
            ..Default::default()
        };
        let decoded = Value::from(serde_json::json!({ "ts": 1456 }));
        let mapped = map_message(&rule, "t", &HashMap::new(), &decoded, receive_time());
        assert_eq!(mapped.timestamp, "1970-01-01T00:00:01.456Z");
    }

    #[test]
    fn test_missing_extractors_fall_back() {
        let rule = MappingConfig {
            value_expr: Some("$.nope".to_string()),
            timestamp_expr: Some("$.nope".to_string()),
            ..Default::default()
        };
        let decoded = Value::from(serde_json::json!({ "a": 1 }));
        let mapped = map_message(&rule, "t", &HashMap::new(), &decoded, receive_time());
        // Unresolvable value expression falls back to the whole payload.
        assert_eq!(mapped.value, decoded);
        assert_eq!(mapped.timestamp, "2026-03-01T00:00:00.000Z");
    }

    #[test]
    fn test_namespace_from_capture() {
        let rule = MappingConfig::default();
        let caps = captures(&[("namespace", "urn:site:f1")]);
        let mapped = map_message(&rule, "t", &caps, &Value::Null, receive_time());
        assert_eq!(mapped.namespace_uri, "urn:site:f1");
    }

    #[test]
    fn test_templates_render_captures() {
        let rule = MappingConfig {
            element_id_template: Some("temp.{site}.{id}".to_string()),
            display_name_template: Some("Temp {id}".to_string()),
            object_type_id: Some("{kind}Tag".to_string()),
            namespace_uri: Some("urn:site:{site}".to_string()),
            ..Default::default()
        };
        let caps = captures(&[("site", "f1"), ("id", "s01"), ("kind", "Temp")]);
        let mapped = map_message(&rule, "t", &caps, &Value::Null, receive_time());
        assert_eq!(mapped.element_id, "temp.f1.s01");
        assert_eq!(mapped.display_name, "Temp s01");
        assert_eq!(mapped.type_id, "TempTag");
        assert_eq!(mapped.namespace_uri, "urn:site:f1");
    }
}
