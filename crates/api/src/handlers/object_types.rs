//! Object-type catalogue reads.

use axum::extract::{Query, State};
use axum::response::Json;

use crate::models::{CatalogueFilter, ElementIdsRequest, ObjectTypesResponse};
use crate::server::ServerState;

/// GET /api/v1/objecttypes?namespaceUri=
pub async fn list_object_types_handler(
    State(state): State<ServerState>,
    Query(filter): Query<CatalogueFilter>,
) -> Json<ObjectTypesResponse> {
    let mut object_types = match &filter.namespace_uri {
        Some(uri) => state.store.get_object_types_by_namespace(uri),
        None => state.store.get_object_types(),
    };
    object_types.sort_by(|a, b| a.element_id.cmp(&b.element_id));
    Json(ObjectTypesResponse { object_types })
}

/// POST /api/v1/objecttypes/query
pub async fn query_object_types_handler(
    State(state): State<ServerState>,
    Json(request): Json<ElementIdsRequest>,
) -> Json<ObjectTypesResponse> {
    let object_types = request
        .element_ids
        .iter()
        .filter_map(|id| state.store.get_object_type(id))
        .collect();
    Json(ObjectTypesResponse { object_types })
}
