//! Payload decomposer: walks a decoded structure and materializes nested
//! mappings as child entities.

use std::collections::BTreeMap;

use i3x_core::config::{ChildIdStrategy, DecomposeConfig, DecomposeStrategy};
use i3x_core::{ObjectInstance, ObjectValue, Value};

use crate::path;

/// Marker keys that never materialize as children or scalar leaves.
const MARKER_FIELDS: [&str; 3] = ["_model", "_name", "_path"];

/// Type assigned to recognized structural children without a model marker.
const COMPONENT_TYPE_ID: &str = "DecomposedComponent";

/// Type assigned to non-mapping leaves.
const SCALAR_TYPE_ID: &str = "ScalarProperty";

/// One entity produced by decomposition, with the id of the entity it is a
/// component of.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedChild {
    pub instance: ObjectInstance,
    pub value: ObjectValue,
    pub parent_component_id: String,
}

/// Decompose a decoded payload under the primary entity.
///
/// The timestamp, quality, and namespace of every produced child are
/// inherited from the primary. Yields nothing when the (optionally
/// narrowed) root is not a mapping.
pub fn decompose(
    config: &DecomposeConfig,
    primary_id: &str,
    namespace_uri: &str,
    timestamp: &str,
    quality: Option<&str>,
    decoded: &Value,
) -> Vec<DecomposedChild> {
    if !config.enabled {
        return Vec::new();
    }
    let root = match &config.root {
        Some(expr) => match path::evaluate(decoded, expr) {
            Some(v) => v,
            None => return Vec::new(),
        },
        None => decoded,
    };
    let Some(map) = root.as_map() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let walker = Walker {
        config,
        namespace_uri,
        timestamp,
        quality,
    };
    walker.walk(map, primary_id, 1, &mut out);
    out
}

struct Walker<'a> {
    config: &'a DecomposeConfig,
    namespace_uri: &'a str,
    timestamp: &'a str,
    quality: Option<&'a str>,
}

impl Walker<'_> {
    fn walk(
        &self,
        map: &BTreeMap<String, Value>,
        parent_id: &str,
        depth: usize,
        out: &mut Vec<DecomposedChild>,
    ) {
        if self.config.max_depth != 0 && depth > self.config.max_depth {
            return;
        }
        for (key, field) in map {
            if self.is_excluded(key) {
                continue;
            }
            match field {
                Value::Map(child_map) => {
                    if !self.is_candidate(child_map) {
                        continue;
                    }
                    let child_id = self.child_id(parent_id, key, child_map);
                    out.push(self.structural_child(&child_id, key, child_map, parent_id));
                    self.walk(child_map, &child_id, depth + 1, out);
                }
                leaf => {
                    let child_id = format!("{}.{}", parent_id, sanitize(key));
                    out.push(self.leaf_child(&child_id, key, leaf, parent_id));
                }
            }
        }
    }

    fn is_excluded(&self, key: &str) -> bool {
        MARKER_FIELDS.contains(&key) || self.config.exclude_fields.iter().any(|f| f == key)
    }

    /// Whether a nested mapping counts as a child under the configured
    /// strategy.
    fn is_candidate(&self, map: &BTreeMap<String, Value>) -> bool {
        let has_markers = map.get("_name").map_or(false, |v| v.as_str().is_some())
            || map.get("_model").map_or(false, |v| v.as_str().is_some());
        match self.config.strategy {
            DecomposeStrategy::Abelara => has_markers,
            DecomposeStrategy::Flat => !map.is_empty(),
            DecomposeStrategy::Auto => has_markers || !map.is_empty(),
        }
    }

    fn child_id(&self, parent_id: &str, key: &str, map: &BTreeMap<String, Value>) -> String {
        if self.config.child_id_strategy == ChildIdStrategy::Path {
            if let Some(path) = map.get("_path").and_then(Value::as_str) {
                return path.replace('/', ".");
            }
        }
        format!("{}.{}", parent_id, sanitize(key))
    }

    fn structural_child(
        &self,
        child_id: &str,
        key: &str,
        map: &BTreeMap<String, Value>,
        parent_id: &str,
    ) -> DecomposedChild {
        let display_name = map
            .get("_name")
            .and_then(Value::as_str)
            .unwrap_or(key)
            .to_string();
        let type_id = map
            .get("_model")
            .and_then(Value::as_str)
            .map(|model| model.rsplit('/').next().unwrap_or(model).to_string())
            .unwrap_or_else(|| COMPONENT_TYPE_ID.to_string());

        // Shallow scalar subset: non-structured fields minus markers and
        // exclusions.
        let scalars: BTreeMap<String, Value> = map
            .iter()
            .filter(|(k, v)| !self.is_excluded(k) && !v.is_structured())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let value = if scalars.is_empty() {
            Value::Null
        } else {
            Value::Map(scalars)
        };

        self.child(child_id, display_name, type_id, value, parent_id)
    }

    fn leaf_child(
        &self,
        child_id: &str,
        key: &str,
        leaf: &Value,
        parent_id: &str,
    ) -> DecomposedChild {
        self.child(
            child_id,
            key.to_string(),
            SCALAR_TYPE_ID.to_string(),
            leaf.clone(),
            parent_id,
        )
    }

    fn child(
        &self,
        child_id: &str,
        display_name: String,
        type_id: String,
        value: Value,
        parent_id: &str,
    ) -> DecomposedChild {
        let instance = ObjectInstance {
            element_id: child_id.to_string(),
            display_name,
            type_id,
            namespace_uri: self.namespace_uri.to_string(),
            is_composition: false,
        };
        let mut object_value = ObjectValue::new(child_id, value, self.timestamp);
        if let Some(quality) = self.quality {
            object_value = object_value.with_quality(quality);
        }
        DecomposedChild {
            instance,
            value: object_value,
            parent_component_id: parent_id.to_string(),
        }
    }
}

/// Keys become id segments; dots and slashes inside them would corrupt the
/// hierarchy.
fn sanitize(key: &str) -> String {
    key.replace(['.', '/'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: &DecomposeConfig, payload: serde_json::Value) -> Vec<DecomposedChild> {
        decompose(
            config,
            "plant.machine",
            "urn:plant",
            "2026-02-02T10:30:45.123Z",
            None,
            &Value::from(payload),
        )
    }

    fn enabled(strategy: DecomposeStrategy) -> DecomposeConfig {
        DecomposeConfig {
            enabled: true,
            strategy,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_yields_nothing() {
        let children = run(
            &DecomposeConfig::default(),
            serde_json::json!({ "a": { "b": 1 } }),
        );
        assert!(children.is_empty());
    }

    #[test]
    fn test_non_mapping_root_yields_nothing() {
        assert!(run(&enabled(DecomposeStrategy::Auto), serde_json::json!(42)).is_empty());
        let config = DecomposeConfig {
            root: Some("$.list".to_string()),
            ..enabled(DecomposeStrategy::Auto)
        };
        assert!(run(&config, serde_json::json!({ "list": [1, 2] })).is_empty());
    }

    #[test]
    fn test_abelara_markers_drive_identity() {
        let children = run(
            &enabled(DecomposeStrategy::Auto),
            serde_json::json!({
                "value": {
                    "_name": "OEE",
                    "_model": "Models/Component/KPI",
                    "Value": 87.7,
                    "UnitsOfMeasure": "%"
                }
            }),
        );
        assert_eq!(children.len(), 1);
        let child = &children[0];
        assert_eq!(child.instance.element_id, "plant.machine.value");
        assert_eq!(child.instance.display_name, "OEE");
        assert_eq!(child.instance.type_id, "KPI");
        assert!(!child.instance.is_composition);
        assert_eq!(child.parent_component_id, "plant.machine");
        let map = child.value.value.as_map().unwrap();
        assert_eq!(map.get("Value"), Some(&Value::Number(87.7)));
        assert_eq!(
            map.get("UnitsOfMeasure"),
            Some(&Value::String("%".to_string()))
        );
        assert!(map.get("_name").is_none());
    }

    #[test]
    fn test_abelara_strategy_skips_unmarked_mappings() {
        let children = run(
            &enabled(DecomposeStrategy::Abelara),
            serde_json::json!({ "plain": { "x": 1 } }),
        );
        assert!(children.is_empty());
    }

    #[test]
    fn test_flat_strategy_takes_every_nonempty_mapping() {
        let children = run(
            &enabled(DecomposeStrategy::Flat),
            serde_json::json!({ "plain": { "x": 1 }, "empty": {} }),
        );
        assert_eq!(children.len(), 2); // "plain" and its "x" leaf
        let plain = children
            .iter()
            .find(|c| c.instance.element_id == "plant.machine.plain")
            .unwrap();
        assert_eq!(plain.instance.type_id, "DecomposedComponent");
        assert_eq!(plain.instance.display_name, "plain");
    }

    #[test]
    fn test_scalar_leaves_become_scalar_properties() {
        let children = run(
            &enabled(DecomposeStrategy::Auto),
            serde_json::json!({ "speed": 12.5, "tags": ["a", "b"] }),
        );
        assert_eq!(children.len(), 2);
        let speed = children
            .iter()
            .find(|c| c.instance.element_id == "plant.machine.speed")
            .unwrap();
        assert_eq!(speed.instance.type_id, "ScalarProperty");
        assert_eq!(speed.value.value, Value::Number(12.5));
        let tags = children
            .iter()
            .find(|c| c.instance.element_id == "plant.machine.tags")
            .unwrap();
        assert!(matches!(tags.value.value, Value::List(_)));
    }

    #[test]
    fn test_exclude_fields_and_markers_never_materialize() {
        let config = DecomposeConfig {
            exclude_fields: vec!["internal".to_string()],
            ..enabled(DecomposeStrategy::Auto)
        };
        let children = run(
            &config,
            serde_json::json!({
                "_path": "ignored",
                "internal": { "x": 1 },
                "kept": 5
            }),
        );
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].instance.element_id, "plant.machine.kept");
    }

    #[test]
    fn test_path_strategy_uses_path_marker() {
        let config = DecomposeConfig {
            child_id_strategy: ChildIdStrategy::Path,
            ..enabled(DecomposeStrategy::Auto)
        };
        let children = run(
            &config,
            serde_json::json!({
                "motor": { "_name": "Motor", "_path": "site/area/motor1", "rpm": 900 }
            }),
        );
        let motor = children
            .iter()
            .find(|c| c.instance.display_name == "Motor")
            .unwrap();
        assert_eq!(motor.instance.element_id, "site.area.motor1");
    }

    #[test]
    fn test_key_sanitization() {
        let children = run(
            &enabled(DecomposeStrategy::Auto),
            serde_json::json!({ "a.b/c": 1 }),
        );
        assert_eq!(children[0].instance.element_id, "plant.machine.a_b_c");
        assert_eq!(children[0].instance.display_name, "a.b/c");
    }

    #[test]
    fn test_recursion_depth_limit() {
        let config = DecomposeConfig {
            max_depth: 1,
            ..enabled(DecomposeStrategy::Flat)
        };
        let children = run(
            &config,
            serde_json::json!({ "l1": { "l2": { "x": 1 } } }),
        );
        // Only the first level is walked.
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].instance.element_id, "plant.machine.l1");
    }

    #[test]
    fn test_nested_components_chain_parent_ids() {
        let children = run(
            &enabled(DecomposeStrategy::Auto),
            serde_json::json!({
                "drive": {
                    "_name": "Drive",
                    "gearbox": { "_name": "Gearbox", "ratio": 3.5 }
                }
            }),
        );
        let gearbox = children
            .iter()
            .find(|c| c.instance.display_name == "Gearbox")
            .unwrap();
        assert_eq!(gearbox.parent_component_id, "plant.machine.drive");
        assert_eq!(gearbox.instance.element_id, "plant.machine.drive.gearbox");
        let ratio = children
            .iter()
            .find(|c| c.instance.element_id == "plant.machine.drive.gearbox.ratio")
            .unwrap();
        assert_eq!(ratio.instance.type_id, "ScalarProperty");
    }

    #[test]
    fn test_inherited_timestamp_and_quality() {
        let config = enabled(DecomposeStrategy::Auto);
        let children = decompose(
            &config,
            "p",
            "urn:x",
            "2026-01-01T00:00:00.000Z",
            Some("Good"),
            &Value::from(serde_json::json!({ "a": 1 })),
        );
        assert_eq!(children[0].value.timestamp, "2026-01-01T00:00:00.000Z");
        assert_eq!(children[0].value.quality.as_deref(), Some("Good"));
        assert_eq!(children[0].instance.namespace_uri, "urn:x");
    }
}
