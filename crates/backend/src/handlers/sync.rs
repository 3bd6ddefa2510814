use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use contracts::domain::sync::{SyncReport, SyncState};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

use super::api_error;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// POST /api/sync
///
/// 409, если цикл уже идёт: повторный запуск не ставится в очередь.
pub async fn run(State(state): State<Arc<AppState>>) -> Result<Json<SyncReport>, ApiError> {
    match state.sync.sync_all().await {
        Ok(Some(report)) => Ok(Json(report)),
        Ok(None) => Err(api_error(
            StatusCode::CONFLICT,
            "Синхронизация уже выполняется",
        )),
        Err(e) => {
            tracing::error!("Синхронизация по запросу не удалась: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    #[serde(flatten)]
    pub state: SyncState,
    pub auto_sync_paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<SyncReport>,
}

/// GET /api/sync/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        state: state.sync.state().await,
        auto_sync_paused: state.worker.is_paused(),
        last_report: state.sync.last_report().await,
    })
}

/// POST /api/sync/pause
pub async fn pause(State(state): State<Arc<AppState>>) -> StatusCode {
    state.worker.pause();
    state.event_log.log("sync", "Автосинхронизация приостановлена");
    StatusCode::OK
}

/// POST /api/sync/resume
pub async fn resume(State(state): State<Arc<AppState>>) -> StatusCode {
    state.worker.resume();
    state.event_log.log("sync", "Автосинхронизация возобновлена");
    StatusCode::OK
}
