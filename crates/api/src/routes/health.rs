//! Health check endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
}

/// GET /health: liveness probe; does not touch the store.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok",
    })
}
