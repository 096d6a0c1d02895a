//! Request and response shapes for the REST surface.

pub mod error;

use serde::{Deserialize, Serialize};

use i3x_core::{ObjectInstance, ObjectType, RelationshipType};
use i3x_store::ObjectStore;

pub use error::ErrorResponse;

/// Result type for all API handlers.
pub type HandlerResult<T> = Result<T, ErrorResponse>;

/// Object info as served by every object-listing endpoint. `parentId` and
/// `hasChildren` are derived by the store, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub element_id: String,
    pub display_name: String,
    pub type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub has_children: bool,
    pub is_composition: bool,
    pub namespace_uri: String,
    /// Only present on `/objects/related` with `includeMetadata`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type_id: Option<String>,
    /// Only present on `/objects/related` with `includeMetadata`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

impl ObjectInfo {
    /// Assemble the wire shape for an instance, deriving the computed
    /// fields from the store.
    pub fn from_instance(store: &ObjectStore, instance: &ObjectInstance) -> Self {
        Self {
            element_id: instance.element_id.clone(),
            display_name: instance.display_name.clone(),
            type_id: instance.type_id.clone(),
            parent_id: store.get_parent_id(&instance.element_id),
            has_children: store.has_children(&instance.element_id),
            is_composition: instance.is_composition,
            namespace_uri: instance.namespace_uri.clone(),
            relationship_type_id: None,
            depth: None,
        }
    }
}

/// Batch-fetch body used by every `/query` and `/list` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementIdsRequest {
    pub element_ids: Vec<String>,
}

/// Body of `POST /objects/related`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedRequest {
    pub element_id: String,
    pub relationship_type_id: Option<String>,
    /// 0 = direct neighbors only; N = N further levels.
    pub depth: usize,
    pub include_metadata: bool,
}

impl Default for RelatedRequest {
    fn default() -> Self {
        Self {
            element_id: String::new(),
            relationship_type_id: None,
            depth: 0,
            include_metadata: false,
        }
    }
}

/// Body of `POST /objects/value`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRequest {
    pub element_ids: Vec<String>,
    /// Component levels to include: 1 (default) = direct, 0 = unlimited.
    #[serde(default = "default_value_depth")]
    pub max_depth: usize,
}

fn default_value_depth() -> usize {
    1
}

/// Filters accepted by the catalogue listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogueFilter {
    pub namespace_uri: Option<String>,
    pub type_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacesResponse {
    pub namespaces: Vec<i3x_core::Namespace>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypesResponse {
    pub object_types: Vec<ObjectType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipTypesResponse {
    pub relationship_types: Vec<RelationshipType>,
}
