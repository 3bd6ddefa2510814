use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use contracts::domain::order::{Order, Platform};
use serde::Deserialize;
use std::sync::Arc;

use crate::platforms::cdek::{CdekCity, CdekDeliveryPoint};
use crate::platforms::TestConnectionResult;
use crate::state::AppState;

use super::{api_error, mutation_error, offline_error};

type ApiError = (StatusCode, Json<serde_json::Value>);

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub platform: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Сдвиг и размер страницы; без них отдаётся вся коллекция
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

fn parse_platform(raw: &str) -> Result<Platform, ApiError> {
    Platform::from_code(raw).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            &format!("Неизвестная платформа: {}", raw),
        )
    })
}

/// GET /api/orders
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let platform = match &query.platform {
        Some(raw) => Some(parse_platform(raw)?),
        None => None,
    };

    // коллекция уже отсортирована по created_date по убыванию
    let orders: Vec<Order> = state
        .sync
        .orders()
        .await
        .into_iter()
        .filter(|o| platform.map_or(true, |p| o.platform == p))
        .filter(|o| {
            query
                .status
                .as_deref()
                .map_or(true, |s| o.status.as_str() == s)
        })
        .filter(|o| query.date_from.map_or(true, |from| o.created_date >= from))
        .filter(|o| query.date_to.map_or(true, |to| o.created_date <= to))
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Ok(Json(orders))
}

/// GET /api/orders/:platform/:id
pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path((platform, id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let platform = parse_platform(&platform)?;
    let client = state.platform_client(platform);
    match client.get_order(&id).await {
        Ok(order) => Ok(Json(order)),
        Err(e) => {
            tracing::error!("Заказ {} ({}) недоступен: {}", id, platform, e);
            Err(offline_error(&format!("Заказ недоступен: {}", e)))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

/// POST /api/orders/:platform/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path((platform, id)): Path<(String, String)>,
    Json(req): Json<CancelRequest>,
) -> Result<StatusCode, ApiError> {
    let platform = parse_platform(&platform)?;
    let client = state.platform_client(platform);

    client
        .cancel_order(&id, &req.reason)
        .await
        .map_err(mutation_error)?;

    state
        .event_log
        .log("orders", &format!("Заказ {} ({}) отменён", id, platform));
    spawn_refresh(&state);
    Ok(StatusCode::OK)
}

/// POST /api/orders/megamarket/:id/pack
pub async fn pack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.megamarket.pack_order(&id).await.map_err(mutation_error)?;
    state
        .event_log
        .log("orders", &format!("Заказ {} (Мегамаркет) упакован", id));
    spawn_refresh(&state);
    Ok(StatusCode::OK)
}

/// POST /api/orders/megamarket/:id/ship
pub async fn ship(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.megamarket.close_order(&id).await.map_err(mutation_error)?;
    state
        .event_log
        .log("orders", &format!("Заказ {} (Мегамаркет) отгружен", id));
    spawn_refresh(&state);
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub new_date: DateTime<Utc>,
}

/// POST /api/orders/megamarket/:id/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .megamarket
        .confirm_order_with_new_date(&id, req.new_date)
        .await
        .map_err(mutation_error)?;
    state.event_log.log(
        "orders",
        &format!("Заказ {} (Мегамаркет) подтверждён с переносом даты", id),
    );
    spawn_refresh(&state);
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct CitiesQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/cdek/cities?q=
pub async fn cdek_cities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CitiesQuery>,
) -> Result<Json<Vec<CdekCity>>, ApiError> {
    match state.cdek.cities(&query.q).await {
        Ok(cities) => Ok(Json(cities)),
        Err(e) => Err(offline_error(&format!("Справочник городов недоступен: {}", e))),
    }
}

/// GET /api/cdek/delivery-points/:city_code
pub async fn cdek_delivery_points(
    State(state): State<Arc<AppState>>,
    Path(city_code): Path<i64>,
) -> Result<Json<Vec<CdekDeliveryPoint>>, ApiError> {
    match state.cdek.delivery_points(city_code).await {
        Ok(points) => Ok(Json(points)),
        Err(e) => Err(offline_error(&format!("Справочник ПВЗ недоступен: {}", e))),
    }
}

/// POST /api/platforms/:platform/test
pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let platform = parse_platform(&platform)?;
    let result: TestConnectionResult = state.platform_client(platform).test_connection().await;
    Ok(Json(serde_json::json!({
        "success": result.success,
        "message": result.message,
        "details": result.details,
    })))
}

/// Мутация меняет состояние на платформе; коллекция обновляется в фоне
fn spawn_refresh(state: &Arc<AppState>) {
    let sync = Arc::clone(&state.sync);
    tokio::spawn(async move {
        if let Err(e) = sync.sync_all().await {
            tracing::error!("Фоновая синхронизация после мутации не удалась: {}", e);
        }
    });
}
