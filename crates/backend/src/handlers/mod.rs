pub mod analytics;
pub mod logs;
pub mod orders;
pub mod storage;
pub mod sync;

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::platforms::PlatformError;

/// Тело ошибки API в едином формате
pub fn api_error(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(json!({
            "error": status.canonical_reason().unwrap_or("error"),
            "message": message,
        })),
    )
}

/// Ответ при недоступной платформе, когда синтетика запрещена
pub fn offline_error(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "service_unavailable",
            "message": message,
            "offline": true,
        })),
    )
}

/// Преобразование ошибки платформенной мутации в HTTP-ответ.
///
/// Ответ API платформы доходит до клиента дословно: молчаливых
/// "успехов" у операций записи не бывает.
pub fn mutation_error(err: PlatformError) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        PlatformError::Api { .. } => api_error(StatusCode::BAD_GATEWAY, &err.to_string()),
        PlatformError::Transport { .. } => offline_error(&err.to_string()),
        PlatformError::Unsupported { .. } => {
            api_error(StatusCode::METHOD_NOT_ALLOWED, &err.to_string())
        }
    }
}
