use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::state::AppState;

/// GET /api/logs
pub async fn list_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<contracts::shared::logger::LogEntry>>, axum::http::StatusCode> {
    match state.event_log.list_all().await {
        Ok(logs) => Ok(Json(logs)),
        Err(_) => Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// POST /api/logs
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<contracts::shared::logger::CreateLogRequest>,
) -> axum::http::StatusCode {
    match state
        .event_log
        .log_event(&req.source, &req.category, &req.message)
        .await
    {
        Ok(_) => axum::http::StatusCode::OK,
        Err(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// DELETE /api/logs
pub async fn clear_all(State(state): State<Arc<AppState>>) -> axum::http::StatusCode {
    match state.event_log.clear_all().await {
        Ok(_) => axum::http::StatusCode::OK,
        Err(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}
