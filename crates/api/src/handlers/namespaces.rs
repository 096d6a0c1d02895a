//! Namespace listing.

use axum::extract::State;
use axum::response::Json;

use crate::models::NamespacesResponse;
use crate::server::ServerState;

/// GET /api/v1/namespaces
pub async fn list_namespaces_handler(State(state): State<ServerState>) -> Json<NamespacesResponse> {
    let mut namespaces = state.store.get_namespaces();
    namespaces.sort_by(|a, b| a.uri.cmp(&b.uri));
    Json(NamespacesResponse { namespaces })
}
