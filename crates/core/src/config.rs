//! Bridge configuration document.
//!
//! A single file (TOML or JSON, chosen by extension) describes the HTTP
//! server, auth, the MQTT broker, seed namespaces and object types, and the
//! mapping rules that drive the ingest pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub mqtt: MqttConfig,
    pub namespaces: Vec<NamespaceConfig>,
    pub object_types: Vec<ObjectTypeConfig>,
    pub mappings: Vec<MappingConfig>,
}

impl BridgeConfig {
    /// Load a configuration document from a TOML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .map_err(|e| Error::Config(format!("invalid JSON config: {}", e))),
            _ => toml::from_str(&text)
                .map_err(|e| Error::Config(format!("invalid TOML config: {}", e))),
        }
    }

    /// Basic sanity checks that catch misconfiguration before startup.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.broker_url.is_empty() {
            return Err(Error::Config("mqtt.broker_url must be set".into()));
        }
        if self.auth.enabled && self.auth.api_keys.is_empty() {
            return Err(Error::Config(
                "auth.enabled requires at least one entry in auth.api_keys".into(),
            ));
        }
        for mapping in &self.mappings {
            if mapping.id.is_empty() {
                return Err(Error::Config("mapping rule id must not be empty".into()));
            }
            if mapping.topic_pattern.is_empty() {
                return Err(Error::Config(format!(
                    "mapping rule '{}' has an empty topic_pattern",
                    mapping.id
                )));
            }
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// API-key authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_keys: Vec<String>,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL, e.g. `mqtt://localhost:1883`.
    pub broker_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keepalive_secs: u64,
    /// Delay between reconnect attempts in milliseconds.
    pub reconnect_period_ms: u64,
    /// MQTT protocol version: "3.1.1" or "5".
    pub protocol_version: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://localhost:1883".to_string(),
            client_id: None,
            username: None,
            password: None,
            keepalive_secs: 60,
            reconnect_period_ms: 5000,
            protocol_version: "3.1.1".to_string(),
        }
    }
}

/// Seed namespace registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub uri: String,
    pub display_name: String,
}

/// Seed object-type registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectTypeConfig {
    pub element_id: String,
    pub display_name: String,
    pub namespace_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// One ingest mapping rule: which topics it claims, how to decode them, and
/// how decoded payloads map onto the information model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Rule identifier, unique within the engine.
    pub id: String,
    /// Literal topic string punctuated by `{name}` placeholders.
    pub topic_pattern: String,
    /// Codec name resolved against the registry.
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_options: Option<CodecOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractConfig>,
    /// Template for the namespace URI; falls back to the `namespace`
    /// capture, then `urn:default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,
    /// Template for the instance type id; defaults to `GenericTag`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type_id: Option<String>,
    /// Template for the element id; defaults to the topic with `/` → `.`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id_template: Option<String>,
    /// Template for the display name; defaults to the element id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name_template: Option<String>,
    /// Path expression selecting the value from the decoded payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_expr: Option<String>,
    /// Path expression selecting the source timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_expr: Option<String>,
    /// Path expression selecting the quality string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decompose: Option<DecomposeConfig>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            topic_pattern: String::new(),
            codec: "json".to_string(),
            codec_options: None,
            extract: None,
            namespace_uri: None,
            object_type_id: None,
            element_id_template: None,
            display_name_template: None,
            value_expr: None,
            timestamp_expr: None,
            quality_expr: None,
            decompose: None,
        }
    }
}

/// Byte order for multi-byte numeric codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Options forwarded to the codec on every decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    pub endian: Endian,
}

/// Bit/byte slice selection applied to the payload before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<usize>,
    /// Advisory here; consumed by multi-byte numeric codecs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endian: Option<Endian>,
}

/// How decomposed children derive their element ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildIdStrategy {
    /// Append the sanitized key to the parent id.
    #[default]
    Key,
    /// Use the child's `_path` marker when present.
    Path,
}

/// Which nested mappings count as child candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecomposeStrategy {
    /// Prefer `_name`/`_model` markers, fall back to flat.
    #[default]
    Auto,
    /// Only mappings carrying `_name` or `_model` markers.
    Abelara,
    /// Every non-empty nested mapping.
    Flat,
}

/// Recursive decomposition of structured payloads into child entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposeConfig {
    pub enabled: bool,
    pub strategy: DecomposeStrategy,
    /// Path expression narrowing decomposition to a sub-tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    pub child_id_strategy: ChildIdStrategy,
    /// Recursion limit; 0 means unlimited.
    pub max_depth: usize,
    /// Keys never materialized as children or scalar leaves.
    pub exclude_fields: Vec<String>,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: DecomposeStrategy::Auto,
            root: None,
            child_id_strategy: ChildIdStrategy::Key,
            max_depth: 10,
            exclude_fields: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.mqtt.keepalive_secs, 60);
        assert!(!config.auth.enabled);
        assert!(config.mappings.is_empty());
    }

    #[test]
    fn test_mapping_from_json() {
        let mapping: MappingConfig = serde_json::from_str(
            r#"{
                "id": "temp",
                "topic_pattern": "{site}/sensors/temp/{id}",
                "codec": "float32",
                "extract": { "byte_offset": 0, "byte_length": 4, "endian": "big" },
                "element_id_template": "temp.{site}.{id}"
            }"#,
        )
        .unwrap();
        assert_eq!(mapping.codec, "float32");
        assert_eq!(
            mapping.extract.unwrap().endian,
            Some(Endian::Big)
        );
        assert!(mapping.decompose.is_none());
    }

    #[test]
    fn test_decompose_defaults() {
        let decompose = DecomposeConfig::default();
        assert_eq!(decompose.max_depth, 10);
        assert_eq!(decompose.strategy, DecomposeStrategy::Auto);
        assert_eq!(decompose.child_id_strategy, ChildIdStrategy::Key);
    }

    #[test]
    fn test_validate_rejects_enabled_auth_without_keys() {
        let config = BridgeConfig {
            auth: AuthConfig {
                enabled: true,
                api_keys: vec![],
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
