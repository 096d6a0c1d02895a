//! Health endpoint.

use axum::extract::State;
use axum::response::Json;

use crate::server::ServerState;

/// Liveness plus a glance at the MQTT side. Public.
pub async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let mqtt = state
        .mqtt
        .as_ref()
        .map(|m| serde_json::to_value(m.status()).unwrap_or_default())
        .unwrap_or(serde_json::Value::Null);
    Json(serde_json::json!({
        "status": "ok",
        "mqtt": mqtt,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
