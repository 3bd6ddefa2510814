use axum::extract::State;
use axum::Json;
use contracts::domain::analytics::AnalyticsSummary;
use std::sync::Arc;

use crate::analytics;
use crate::state::AppState;

/// GET /api/analytics/summary
///
/// Метрики считаются по требованию из текущего снимка коллекции.
pub async fn summary(State(state): State<Arc<AppState>>) -> Json<AnalyticsSummary> {
    let orders = state.sync.orders().await;
    Json(analytics::summarize(&orders))
}
