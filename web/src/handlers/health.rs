//! Health check endpoint.
//!
//! Used by load balancers and monitoring for basic liveness; it does not
//! probe dependencies.

use axum::http::StatusCode;
use axum::Json;

/// `GET /api/v1/health` → 200 `{"status":"ok"}`.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
