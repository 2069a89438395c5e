//! Liveness check

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub(super) async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "alive" })))
}
