use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Конфигурация всех роутов приложения
pub fn configure_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // ORDERS
        // ========================================
        .route("/api/orders", get(handlers::orders::list_all))
        .route(
            "/api/orders/:platform/:id",
            get(handlers::orders::get_by_id),
        )
        .route(
            "/api/orders/:platform/:id/cancel",
            post(handlers::orders::cancel),
        )
        .route(
            "/api/orders/megamarket/:id/pack",
            post(handlers::orders::pack),
        )
        .route(
            "/api/orders/megamarket/:id/ship",
            post(handlers::orders::ship),
        )
        .route(
            "/api/orders/megamarket/:id/confirm",
            post(handlers::orders::confirm),
        )
        // ========================================
        // PLATFORM LOOKUPS
        // ========================================
        .route("/api/cdek/cities", get(handlers::orders::cdek_cities))
        .route(
            "/api/cdek/delivery-points/:city_code",
            get(handlers::orders::cdek_delivery_points),
        )
        .route(
            "/api/platforms/:platform/test",
            post(handlers::orders::test_connection),
        )
        // ========================================
        // SYNC
        // ========================================
        .route("/api/sync", post(handlers::sync::run))
        .route("/api/sync/status", get(handlers::sync::status))
        .route("/api/sync/pause", post(handlers::sync::pause))
        .route("/api/sync/resume", post(handlers::sync::resume))
        // ========================================
        // ANALYTICS
        // ========================================
        .route("/api/analytics/summary", get(handlers::analytics::summary))
        // ========================================
        // STORAGE
        // ========================================
        .route("/api/storage/backup", get(handlers::storage::backup))
        .route("/api/storage/restore", post(handlers::storage::restore))
        .route("/api/storage", delete(handlers::storage::clear))
        // ========================================
        // LOGS
        // ========================================
        .route(
            "/api/logs",
            get(handlers::logs::list_all)
                .post(handlers::logs::create)
                .delete(handlers::logs::clear_all),
        )
        .with_state(state)
}
