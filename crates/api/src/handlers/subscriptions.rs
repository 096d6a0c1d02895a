//! Subscription surface: CRUD, monitored-item mutation, SSE streaming, and
//! the sync drain.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use futures::Stream;
use serde::Deserialize;
use uuid::Uuid;

use i3x_core::ObjectValue;
use i3x_subscription::{CreateSubscription, SubscriptionInfo};

use crate::auth::key_from_headers;
use crate::models::{ElementIdsRequest, ErrorResponse};
use crate::server::ServerState;

/// POST /api/v1/subscriptions
pub async fn create_subscription_handler(
    State(state): State<ServerState>,
    body: Option<Json<CreateSubscription>>,
) -> (StatusCode, Json<SubscriptionInfo>) {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    let info = state.subscriptions.create(params);
    (StatusCode::CREATED, Json(info))
}

/// GET /api/v1/subscriptions
pub async fn list_subscriptions_handler(
    State(state): State<ServerState>,
) -> Json<Vec<SubscriptionInfo>> {
    let mut infos = state.subscriptions.list();
    infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(infos)
}

/// GET /api/v1/subscriptions/:id
pub async fn get_subscription_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionInfo>, ErrorResponse> {
    state
        .subscriptions
        .get(id)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found(format!("subscription {}", id)))
}

/// DELETE /api/v1/subscriptions/:id
pub async fn delete_subscription_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    if state.subscriptions.delete(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ErrorResponse::not_found(format!("subscription {}", id)))
    }
}

/// POST /api/v1/subscriptions/:id/register
pub async fn register_items_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ElementIdsRequest>,
) -> Result<Json<SubscriptionInfo>, ErrorResponse> {
    state
        .subscriptions
        .register_items(id, &request.element_ids)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found(format!("subscription {}", id)))
}

/// POST /api/v1/subscriptions/:id/unregister
pub async fn unregister_items_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ElementIdsRequest>,
) -> Result<Json<SubscriptionInfo>, ErrorResponse> {
    state
        .subscriptions
        .unregister_items(id, &request.element_ids)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found(format!("subscription {}", id)))
}

/// POST /api/v1/subscriptions/:id/sync
///
/// Atomically drains and returns the pending queue. Quality is left exactly
/// as stored; this is a pull path, not the SSE wire.
pub async fn sync_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ObjectValue>>, ErrorResponse> {
    state
        .subscriptions
        .sync(id)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found(format!("subscription {}", id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    api_key: Option<String>,
}

/// GET /api/v1/subscriptions/:id/stream
///
/// Server-Sent-Events: an initial `: connected` comment, then one `data:`
/// frame per monitored update. The key may arrive via `?api_key=` because
/// EventSource cannot set headers. Auth is checked here, not in middleware.
pub async fn stream_handler(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ErrorResponse> {
    let key = params.api_key.as_deref().or_else(|| key_from_headers(&headers));
    if !state.auth.check(key) {
        return Err(ErrorResponse::unauthorized("missing or invalid API key"));
    }

    let rx = state
        .subscriptions
        .attach_sse(id)
        .ok_or_else(|| ErrorResponse::not_found(format!("subscription {}", id)))?;

    let stream = async_stream::stream! {
        yield Ok(Event::default().comment("connected"));
        let mut rx = rx;
        // Ends when the manager drops the sender: delete, replacement
        // attach, or detach after a failed send.
        while let Some(frame) = rx.recv().await {
            yield Ok(Event::default().data(frame));
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(30))
            .text("keepalive"),
    ))
}
