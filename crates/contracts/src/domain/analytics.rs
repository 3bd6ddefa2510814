use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Точка дневного тренда
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub orders: usize,
    pub revenue: f64,
}

/// Сводные метрики по объединённой коллекции заказов.
///
/// Считаются по требованию из текущего снимка, ничего не кэшируют.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_orders: usize,
    pub total_revenue: f64,
    /// Средний чек; 0 при пустой коллекции
    pub average_order_value: f64,
    /// Количество заказов по нормализованным статусам
    pub by_status: BTreeMap<String, usize>,
    /// Количество заказов по платформам
    pub by_platform: BTreeMap<String, usize>,
    /// Доля доставленных, 0..=1
    pub delivered_rate: f64,
    /// Доля отменённых, 0..=1
    pub cancelled_rate: f64,
    /// Заказы с проблемным статусом
    pub problem_count: usize,
    /// Сколько заказов в снимке синтетические (mock)
    pub synthetic_count: usize,
    pub daily: Vec<DailyPoint>,
}
