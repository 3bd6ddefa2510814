use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::shared::storage::StorageBackup;
use crate::state::AppState;

use super::api_error;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// GET /api/storage/backup
pub async fn backup(State(state): State<Arc<AppState>>) -> Result<Json<StorageBackup>, ApiError> {
    match state.storage.backup().await {
        Ok(backup) => Ok(Json(backup)),
        Err(e) => {
            tracing::error!("Backup хранилища не удался: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
        }
    }
}

/// POST /api/storage/restore
///
/// Снимок валидируется целиком до записи; при ошибке текущие данные
/// остаются нетронутыми.
pub async fn restore(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<StorageBackup>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.storage.restore(&snapshot).await {
        Ok(restored) => {
            state
                .event_log
                .log("storage", &format!("Восстановлено {} ключей из снимка", restored));
            Ok(Json(serde_json::json!({ "restored": restored })))
        }
        Err(e) => Err(api_error(StatusCode::BAD_REQUEST, &e.to_string())),
    }
}

/// DELETE /api/storage
pub async fn clear(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    match state.storage.clear().await {
        Ok(()) => {
            state.event_log.log("storage", "Хранилище приложения очищено");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())),
    }
}
