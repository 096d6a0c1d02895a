//! Application router configuration.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::types::{ServerState, MAX_REQUEST_BODY_SIZE};
use crate::auth::require_api_key;
use crate::handlers::{
    admin, basic, namespaces, object_types, objects, relationship_types, subscriptions,
};

/// Create the application router.
pub fn create_router(state: ServerState) -> Router {
    // Public routes (no authentication).
    let public_routes = Router::new().route("/health", get(basic::health_handler));

    // The SSE stream authenticates inside the handler (EventSource cannot
    // set headers), so it skips the middleware.
    let stream_routes = Router::new().route(
        "/api/v1/subscriptions/:id/stream",
        get(subscriptions::stream_handler),
    );

    // Read surface plus subscription management.
    let api_routes = Router::new()
        .route("/api/v1/namespaces", get(namespaces::list_namespaces_handler))
        .route(
            "/api/v1/objecttypes",
            get(object_types::list_object_types_handler),
        )
        .route(
            "/api/v1/objecttypes/query",
            post(object_types::query_object_types_handler),
        )
        .route(
            "/api/v1/relationshiptypes",
            get(relationship_types::list_relationship_types_handler),
        )
        .route(
            "/api/v1/relationshiptypes/query",
            post(relationship_types::query_relationship_types_handler),
        )
        .route("/api/v1/objects", get(objects::list_objects_handler))
        .route(
            "/api/v1/objects/list",
            post(objects::list_objects_by_id_handler),
        )
        .route(
            "/api/v1/objects/related",
            post(objects::related_objects_handler),
        )
        .route("/api/v1/objects/value", post(objects::object_values_handler))
        .route(
            "/api/v1/objects/history",
            post(objects::object_history_handler),
        )
        .route(
            "/api/v1/subscriptions",
            post(subscriptions::create_subscription_handler)
                .get(subscriptions::list_subscriptions_handler),
        )
        .route(
            "/api/v1/subscriptions/:id",
            get(subscriptions::get_subscription_handler)
                .delete(subscriptions::delete_subscription_handler),
        )
        .route(
            "/api/v1/subscriptions/:id/register",
            post(subscriptions::register_items_handler),
        )
        .route(
            "/api/v1/subscriptions/:id/unregister",
            post(subscriptions::unregister_items_handler),
        )
        .route(
            "/api/v1/subscriptions/:id/sync",
            post(subscriptions::sync_handler),
        );

    // Admin surface.
    let admin_routes = Router::new()
        .route(
            "/admin/objecttypes",
            post(admin::create_object_type_handler).get(admin::list_object_types_handler),
        )
        .route(
            "/admin/objecttypes/:id",
            get(admin::get_object_type_handler)
                .put(admin::update_object_type_handler)
                .delete(admin::delete_object_type_handler),
        )
        .route(
            "/admin/mappings",
            post(admin::create_mapping_handler).get(admin::list_mappings_handler),
        )
        .route(
            "/admin/mappings/:id",
            get(admin::get_mapping_handler)
                .put(admin::update_mapping_handler)
                .delete(admin::delete_mapping_handler),
        )
        .route("/admin/namespaces", post(admin::create_namespace_handler))
        .route("/admin/stats", get(admin::stats_handler))
        .route("/admin/mqtt/status", get(admin::mqtt_status_handler));

    let protected_routes = api_routes.merge(admin_routes).route_layer(
        middleware::from_fn_with_state(state.clone(), require_api_key),
    );

    public_routes
        .merge(stream_routes)
        .merge(protected_routes)
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            MAX_REQUEST_BODY_SIZE,
        ))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
