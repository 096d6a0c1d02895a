//! Relationship-type catalogue reads.

use axum::extract::{Query, State};
use axum::response::Json;

use crate::models::{CatalogueFilter, ElementIdsRequest, RelationshipTypesResponse};
use crate::server::ServerState;

/// GET /api/v1/relationshiptypes?namespaceUri=
pub async fn list_relationship_types_handler(
    State(state): State<ServerState>,
    Query(filter): Query<CatalogueFilter>,
) -> Json<RelationshipTypesResponse> {
    let mut relationship_types = match &filter.namespace_uri {
        Some(uri) => state.store.get_relationship_types_by_namespace(uri),
        None => state.store.get_relationship_types(),
    };
    relationship_types.sort_by(|a, b| a.element_id.cmp(&b.element_id));
    Json(RelationshipTypesResponse { relationship_types })
}

/// POST /api/v1/relationshiptypes/query
pub async fn query_relationship_types_handler(
    State(state): State<ServerState>,
    Json(request): Json<ElementIdsRequest>,
) -> Json<RelationshipTypesResponse> {
    let relationship_types = request
        .element_ids
        .iter()
        .filter_map(|id| state.store.get_relationship_type(id))
        .collect();
    Json(RelationshipTypesResponse { relationship_types })
}
