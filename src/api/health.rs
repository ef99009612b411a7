use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::{blockchain::services::health::endpoint_health, AppState};

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = endpoint_health(state.rpc_client.pool());
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": health.total,
        "ready": health.ready,
    }))
}

// The handler function for the GET /endpoints endpoint.
pub async fn endpoints_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(endpoint_health(state.rpc_client.pool()))
}
