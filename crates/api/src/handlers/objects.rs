//! Object reads: listing, relationship traversal, and the last-known-value
//! composition tree.

use std::collections::HashSet;

use axum::extract::{Query, State};
use axum::response::Json;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use i3x_core::relationship_types::HAS_COMPONENT;
use i3x_core::ObjectValue;
use i3x_store::ObjectStore;

use crate::models::{
    CatalogueFilter, ElementIdsRequest, ErrorResponse, ObjectInfo, RelatedRequest, ValueRequest,
};
use crate::server::ServerState;

/// GET /api/v1/objects?namespaceUri=&typeId=
pub async fn list_objects_handler(
    State(state): State<ServerState>,
    Query(filter): Query<CatalogueFilter>,
) -> Json<Vec<ObjectInfo>> {
    let instances = match (&filter.namespace_uri, &filter.type_id) {
        (Some(uri), _) => state.store.get_instances_by_namespace(uri),
        (None, Some(type_id)) => state.store.get_instances_by_type(type_id),
        (None, None) => state.store.get_all_instances(),
    };
    let mut objects: Vec<ObjectInfo> = instances
        .iter()
        .filter(|i| {
            filter
                .type_id
                .as_ref()
                .map_or(true, |type_id| &i.type_id == type_id)
        })
        .map(|i| ObjectInfo::from_instance(&state.store, i))
        .collect();
    objects.sort_by(|a, b| a.element_id.cmp(&b.element_id));
    Json(objects)
}

/// POST /api/v1/objects/list
pub async fn list_objects_by_id_handler(
    State(state): State<ServerState>,
    Json(request): Json<ElementIdsRequest>,
) -> Json<Vec<ObjectInfo>> {
    let objects = request
        .element_ids
        .iter()
        .filter_map(|id| state.store.get_instance(id))
        .map(|i| ObjectInfo::from_instance(&state.store, &i))
        .collect();
    Json(objects)
}

/// POST /api/v1/objects/related
///
/// Breadth-first traversal from the element: `depth = 0` returns direct
/// neighbors only, `depth = N` goes N further levels. A visited set makes
/// cyclic graphs safe.
pub async fn related_objects_handler(
    State(state): State<ServerState>,
    Json(request): Json<RelatedRequest>,
) -> Result<Json<Vec<ObjectInfo>>, ErrorResponse> {
    if request.element_id.is_empty() {
        return Err(ErrorResponse::bad_request("elementId must not be empty"));
    }

    let mut visited: HashSet<String> = HashSet::from([request.element_id.clone()]);
    let mut frontier = vec![request.element_id.clone()];
    let mut results = Vec::new();

    for level in 0..=request.depth {
        let mut next = Vec::new();
        for id in &frontier {
            for rel in state
                .store
                .get_relationships(id, request.relationship_type_id.as_deref())
            {
                if !visited.insert(rel.target_id.clone()) {
                    continue;
                }
                next.push(rel.target_id.clone());
                if let Some(instance) = state.store.get_instance(&rel.target_id) {
                    let mut info = ObjectInfo::from_instance(&state.store, &instance);
                    if request.include_metadata {
                        info.relationship_type_id = Some(rel.type_id.clone());
                        info.depth = Some(level);
                    }
                    results.push(info);
                }
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }

    Ok(Json(results))
}

/// POST /api/v1/objects/value
///
/// Last-known values, expanded into a composition tree along
/// `HasComponent` edges. Unknown ids map to `null`.
pub async fn object_values_handler(
    State(state): State<ServerState>,
    Json(request): Json<ValueRequest>,
) -> Json<JsonValue> {
    // maxDepth counts component levels below the element; 0 is unlimited.
    let levels = match request.max_depth {
        0 => None,
        n => Some(n),
    };
    let mut out = JsonMap::new();
    for element_id in &request.element_ids {
        let mut visited = HashSet::new();
        let node = value_node(&state.store, element_id, levels, &mut visited);
        out.insert(element_id.clone(), node.unwrap_or(JsonValue::Null));
    }
    Json(JsonValue::Object(out))
}

/// POST /api/v1/objects/history
pub async fn object_history_handler() -> ErrorResponse {
    ErrorResponse::not_implemented("the bridge is strictly last-known-value")
}

/// Render one element's `{ data: [...], <childId>: {...} }` node.
/// `levels` is the remaining component-level budget, `None` for unlimited.
/// Recursion follows `HasComponent` edges whether or not the element is a
/// composition.
fn value_node(
    store: &ObjectStore,
    element_id: &str,
    levels: Option<usize>,
    visited: &mut HashSet<String>,
) -> Option<JsonValue> {
    let value = store.get_value(element_id)?;
    if !visited.insert(element_id.to_string()) {
        return None;
    }

    let mut node = JsonMap::new();
    node.insert("data".to_string(), json!([vqt(&value)]));

    if levels != Some(0) {
        let child_levels = levels.map(|n| n - 1);
        for child_id in store.get_related_element_ids(element_id, Some(HAS_COMPONENT)) {
            if let Some(child_node) = value_node(store, &child_id, child_levels, visited) {
                node.insert(child_id, child_node);
            }
        }
    }
    Some(JsonValue::Object(node))
}

/// The value/quality/timestamp record. Quality stays exactly as stored on
/// this path (absent renders as null).
fn vqt(value: &ObjectValue) -> JsonValue {
    json!({
        "value": value.value,
        "quality": value.quality,
        "timestamp": value.timestamp,
    })
}
