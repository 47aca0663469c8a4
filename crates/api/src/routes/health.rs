use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Liveness payload for `GET /`.
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// Readiness payload for `GET /health`.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// GET / -- static liveness answer. Never touches the store.
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "JAN-URL Conversion API",
        status: "healthy",
    })
}

/// GET /health -- verifies the record store answers a trivial query.
async fn readiness(State(state): State<AppState>) -> AppResult<Json<ReadinessResponse>> {
    state
        .store
        .ping()
        .await
        .map_err(|e| AppError::StoreUnavailable(format!("Database connection failed: {e}")))?;

    Ok(Json(ReadinessResponse {
        status: "ready",
        database: "connected",
    }))
}

/// Mount probe routes at the root level.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(readiness))
}
