//! The i3X information model: namespaces, object types, instances, values,
//! and typed relationships.
//!
//! Element identifiers are opaque strings, dot-segmented by convention
//! (`a.b.c`): the last segment is a display hint, the prefix is the parent
//! path.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Unique identifier for an element within a store.
pub type ElementId = String;

/// Parent prefix of a dot-segmented element id, if it has one.
///
/// `"a.b.c"` → `Some("a.b")`; `"a"` → `None`.
pub fn parent_of(element_id: &str) -> Option<&str> {
    match element_id.rsplit_once('.') {
        Some((prefix, _)) if !prefix.is_empty() => Some(prefix),
        _ => None,
    }
}

/// Last dot-segment of an element id, used as its display hint.
pub fn last_segment(element_id: &str) -> &str {
    element_id.rsplit_once('.').map_or(element_id, |(_, s)| s)
}

/// A URI-keyed bucket grouping types and instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// Namespace URI.
    pub uri: String,
    /// Human-readable name.
    pub display_name: String,
}

/// Catalogue entry for a class of object instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    pub element_id: ElementId,
    pub display_name: String,
    pub namespace_uri: String,
    /// Optional free-form schema document for the type's values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// A single live object in the graph.
///
/// The store exclusively owns all instances; external code holds immutable
/// snapshots only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInstance {
    pub element_id: ElementId,
    pub display_name: String,
    pub type_id: String,
    pub namespace_uri: String,
    pub is_composition: bool,
}

impl ObjectInstance {
    pub fn new(
        element_id: impl Into<ElementId>,
        display_name: impl Into<String>,
        type_id: impl Into<String>,
        namespace_uri: impl Into<String>,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            display_name: display_name.into(),
            type_id: type_id.into(),
            namespace_uri: namespace_uri.into(),
            is_composition: false,
        }
    }

    pub fn with_composition(mut self, is_composition: bool) -> Self {
        self.is_composition = is_composition;
        self
    }
}

/// The current (value, timestamp, quality) triple for an element.
///
/// `timestamp` carries an RFC 3339 instant; strings extracted from source
/// payloads pass through untouched, so it is kept as text rather than a
/// parsed instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectValue {
    pub element_id: ElementId,
    pub value: Value,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl ObjectValue {
    pub fn new(element_id: impl Into<ElementId>, value: Value, timestamp: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            value,
            timestamp: timestamp.into(),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }
}

/// Catalogue entry for a class of directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipType {
    pub element_id: ElementId,
    pub display_name: String,
    pub namespace_uri: String,
    /// Element id of the paired inverse type.
    pub reverse_of: String,
}

/// A directed (source → target) edge of a given type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source_id: ElementId,
    pub target_id: ElementId,
    pub type_id: String,
}

/// Built-in relationship types, seeded into every store at construction.
pub mod relationship_types {
    use super::RelationshipType;

    /// Namespace holding the built-in relationship types.
    pub const NAMESPACE: &str = "urn:i3x:relationships";

    pub const HAS_PARENT: &str = "HasParent";
    pub const HAS_CHILDREN: &str = "HasChildren";
    pub const HAS_COMPONENT: &str = "HasComponent";
    pub const COMPONENT_OF: &str = "ComponentOf";

    /// The four built-in types with their inverse pairing.
    pub fn builtin() -> Vec<RelationshipType> {
        let pair = |id: &str, name: &str, reverse: &str| RelationshipType {
            element_id: id.to_string(),
            display_name: name.to_string(),
            namespace_uri: NAMESPACE.to_string(),
            reverse_of: reverse.to_string(),
        };
        vec![
            pair(HAS_PARENT, "Has Parent", HAS_CHILDREN),
            pair(HAS_CHILDREN, "Has Children", HAS_PARENT),
            pair(HAS_COMPONENT, "Has Component", COMPONENT_OF),
            pair(COMPONENT_OF, "Component Of", HAS_COMPONENT),
        ]
    }
}

/// Type id assigned to auto-created ancestor instances.
pub const PLACEHOLDER_TYPE_ID: &str = "Placeholder";

/// Quality stamped on placeholder values.
pub const PLACEHOLDER_QUALITY: &str = "uncertain";

/// Quality reported on the SSE wire when a value has none.
pub const DEFAULT_QUALITY: &str = "Good";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("a.b.c"), Some("a.b"));
        assert_eq!(parent_of("a.b"), Some("a"));
        assert_eq!(parent_of("a"), None);
        assert_eq!(parent_of(""), None);
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("a.b.c"), "c");
        assert_eq!(last_segment("solo"), "solo");
    }

    #[test]
    fn test_builtin_relationship_types_pair_up() {
        let types = relationship_types::builtin();
        assert_eq!(types.len(), 4);
        for ty in &types {
            let reverse = types
                .iter()
                .find(|t| t.element_id == ty.reverse_of)
                .expect("missing inverse");
            assert_eq!(reverse.reverse_of, ty.element_id);
            assert_eq!(ty.namespace_uri, relationship_types::NAMESPACE);
        }
    }

    #[test]
    fn test_object_value_serializes_camel_case() {
        let ov = ObjectValue::new("a.b", Value::Number(1.0), "1970-01-01T00:00:00.000Z");
        let json = serde_json::to_value(&ov).unwrap();
        assert_eq!(json["elementId"], "a.b");
        assert!(json.get("quality").is_none());
    }
}
