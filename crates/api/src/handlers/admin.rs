//! Admin surface: object-type and mapping-rule CRUD, namespace
//! registration, and operational status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use tracing::{info, warn};

use i3x_core::config::MappingConfig;
use i3x_core::{Namespace, ObjectType};
use i3x_pipeline::TopicPattern;

use crate::models::{ErrorResponse, ObjectTypesResponse};
use crate::server::ServerState;

// ----------------------------------------------------------------------
// Object types

/// POST /admin/objecttypes
pub async fn create_object_type_handler(
    State(state): State<ServerState>,
    Json(object_type): Json<ObjectType>,
) -> Result<(StatusCode, Json<ObjectType>), ErrorResponse> {
    if object_type.element_id.is_empty() {
        return Err(ErrorResponse::bad_request("elementId must not be empty"));
    }
    if state.store.get_object_type(&object_type.element_id).is_some() {
        return Err(ErrorResponse::conflict(format!(
            "object type '{}' already exists",
            object_type.element_id
        )));
    }
    state.store.register_object_type(object_type.clone());
    info!(type_id = %object_type.element_id, "registered object type");
    Ok((StatusCode::CREATED, Json(object_type)))
}

/// GET /admin/objecttypes
pub async fn list_object_types_handler(
    State(state): State<ServerState>,
) -> Json<ObjectTypesResponse> {
    let mut object_types = state.store.get_object_types();
    object_types.sort_by(|a, b| a.element_id.cmp(&b.element_id));
    Json(ObjectTypesResponse { object_types })
}

/// GET /admin/objecttypes/:id
pub async fn get_object_type_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<ObjectType>, ErrorResponse> {
    state
        .store
        .get_object_type(&id)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found(format!("object type '{}'", id)))
}

/// PUT /admin/objecttypes/:id
pub async fn update_object_type_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(mut object_type): Json<ObjectType>,
) -> Result<Json<ObjectType>, ErrorResponse> {
    if state.store.get_object_type(&id).is_none() {
        return Err(ErrorResponse::not_found(format!("object type '{}'", id)));
    }
    object_type.element_id = id;
    state.store.register_object_type(object_type.clone());
    Ok(Json(object_type))
}

/// DELETE /admin/objecttypes/:id. 409 while instances reference it.
pub async fn delete_object_type_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    state.store.delete_object_type(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Mapping rules

/// POST /admin/mappings
///
/// Compiles the rule, then subscribes the broker-side topic derived by
/// replacing each `{x}` with `+`.
pub async fn create_mapping_handler(
    State(state): State<ServerState>,
    Json(config): Json<MappingConfig>,
) -> Result<(StatusCode, Json<MappingConfig>), ErrorResponse> {
    validate_mapping(&state, &config)?;
    let rule = state.pipeline.engine().write().add_rule(config.clone())?;
    subscribe_rule_topic(&state, &rule.pattern).await;
    info!(rule = %config.id, pattern = %config.topic_pattern, "added mapping rule");
    Ok((StatusCode::CREATED, Json(config)))
}

/// GET /admin/mappings
pub async fn list_mappings_handler(State(state): State<ServerState>) -> Json<Vec<MappingConfig>> {
    Json(state.pipeline.engine().read().list_rules())
}

/// GET /admin/mappings/:id
pub async fn get_mapping_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<MappingConfig>, ErrorResponse> {
    state
        .pipeline
        .engine()
        .read()
        .get_rule(&id)
        .map(|rule| Json(rule.config.clone()))
        .ok_or_else(|| ErrorResponse::not_found(format!("mapping rule '{}'", id)))
}

/// PUT /admin/mappings/:id
///
/// The new pattern's topic is subscribed; a stale topic from the previous
/// pattern stays subscribed (another rule may share it).
pub async fn update_mapping_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(mut config): Json<MappingConfig>,
) -> Result<Json<MappingConfig>, ErrorResponse> {
    config.id = id;
    validate_mapping(&state, &config)?;
    let rule = state.pipeline.engine().write().update_rule(config.clone())?;
    subscribe_rule_topic(&state, &rule.pattern).await;
    Ok(Json(config))
}

/// DELETE /admin/mappings/:id
pub async fn delete_mapping_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    if state.pipeline.engine().write().remove_rule(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ErrorResponse::not_found(format!("mapping rule '{}'", id)))
    }
}

fn validate_mapping(state: &ServerState, config: &MappingConfig) -> Result<(), ErrorResponse> {
    if config.id.is_empty() {
        return Err(ErrorResponse::bad_request("rule id must not be empty"));
    }
    if config.topic_pattern.is_empty() {
        return Err(ErrorResponse::bad_request("topic_pattern must not be empty"));
    }
    if !state.pipeline.codecs().contains(&config.codec) {
        return Err(ErrorResponse::bad_request(format!(
            "unknown codec '{}'",
            config.codec
        )));
    }
    Ok(())
}

async fn subscribe_rule_topic(state: &ServerState, pattern: &TopicPattern) {
    let Some(mqtt) = &state.mqtt else {
        return;
    };
    let topic = pattern.mqtt_subscription_topic();
    if let Err(e) = mqtt.subscribe(&topic).await {
        // The topic is in the managed set; reconnect will retry it.
        warn!(topic = %topic, error = %e, "subscribe failed, deferred to reconnect");
    }
}

// ----------------------------------------------------------------------
// Namespaces, stats, MQTT status

/// POST /admin/namespaces. Registration-only; there is no delete.
pub async fn create_namespace_handler(
    State(state): State<ServerState>,
    Json(namespace): Json<Namespace>,
) -> Result<(StatusCode, Json<Namespace>), ErrorResponse> {
    if namespace.uri.is_empty() {
        return Err(ErrorResponse::bad_request("uri must not be empty"));
    }
    if !state.store.register_namespace(namespace.clone()) {
        return Err(ErrorResponse::conflict(format!(
            "namespace '{}' already registered",
            namespace.uri
        )));
    }
    Ok((StatusCode::CREATED, Json(namespace)))
}

/// GET /admin/stats
pub async fn stats_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "pipeline": state.pipeline.stats(),
        "store": state.store.stats(),
        "subscriptions": state.subscriptions.list().len(),
    }))
}

/// GET /admin/mqtt/status
pub async fn mqtt_status_handler(
    State(state): State<ServerState>,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    let mqtt = state
        .mqtt
        .as_ref()
        .ok_or_else(|| ErrorResponse::service_unavailable("MQTT transport not running"))?;
    let topics = mqtt.subscribed_topics();
    Ok(Json(serde_json::json!({
        "state": mqtt.status(),
        "brokerUrl": mqtt.broker_url(),
        "topicCount": topics.len(),
        "topics": topics,
    })))
}
