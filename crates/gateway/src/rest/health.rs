//! Liveness endpoint.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::state::GatewayState;

pub fn routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/health", get(health))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
