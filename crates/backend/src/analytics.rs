use contracts::domain::analytics::{AnalyticsSummary, DailyPoint};
use contracts::domain::order::{DataProvenance, Order, OrderStatus};
use std::collections::BTreeMap;

/// Сводные метрики по коллекции заказов.
///
/// Считается за один проход; дневной тренд отсортирован по дате.
pub fn summarize(orders: &[Order]) -> AnalyticsSummary {
    let total_orders = orders.len();
    let total_revenue: f64 = orders.iter().map(|o| o.total_amount).sum();

    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_platform: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_day: BTreeMap<chrono::NaiveDate, (usize, f64)> = BTreeMap::new();
    let mut delivered = 0usize;
    let mut cancelled = 0usize;
    let mut problem_count = 0usize;
    let mut synthetic_count = 0usize;

    for order in orders {
        *by_status.entry(order.status.as_str().to_string()).or_default() += 1;
        *by_platform
            .entry(order.platform.as_str().to_string())
            .or_default() += 1;

        let day = by_day.entry(order.created_date.date_naive()).or_default();
        day.0 += 1;
        day.1 += order.total_amount;

        match order.status {
            OrderStatus::Delivered => delivered += 1,
            OrderStatus::Cancelled => cancelled += 1,
            OrderStatus::Problem => problem_count += 1,
            _ => {}
        }
        if order.provenance == DataProvenance::Synthetic {
            synthetic_count += 1;
        }
    }

    let average_order_value = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };
    let rate = |n: usize| {
        if total_orders > 0 {
            n as f64 / total_orders as f64
        } else {
            0.0
        }
    };

    AnalyticsSummary {
        total_orders,
        total_revenue,
        average_order_value,
        by_status,
        by_platform,
        delivered_rate: rate(delivered),
        cancelled_rate: rate(cancelled),
        problem_count,
        synthetic_count,
        daily: by_day
            .into_iter()
            .map(|(date, (orders, revenue))| DailyPoint {
                date,
                orders,
                revenue,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock;
    use chrono::{TimeZone, Utc};
    use contracts::domain::order::Platform;

    fn order(platform: Platform, status: OrderStatus, amount: f64, day: u32) -> Order {
        let mut o = mock::mock_order(platform, &format!("{:?}-{}-{}", platform, status.as_str(), day));
        o.status = status;
        o.total_amount = amount;
        o.provenance = DataProvenance::Live;
        o.created_date = Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap();
        o
    }

    #[test]
    fn test_empty_collection_gives_zeroes() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_orders, 0);
        assert_eq!(summary.average_order_value, 0.0);
        assert_eq!(summary.delivered_rate, 0.0);
        assert!(summary.daily.is_empty());
    }

    #[test]
    fn test_totals_and_rates() {
        let orders = vec![
            order(Platform::Cdek, OrderStatus::Delivered, 1000.0, 1),
            order(Platform::Cdek, OrderStatus::Cancelled, 2000.0, 1),
            order(Platform::Megamarket, OrderStatus::Problem, 3000.0, 2),
            order(Platform::Megamarket, OrderStatus::InTransit, 4000.0, 3),
        ];
        let summary = summarize(&orders);

        assert_eq!(summary.total_orders, 4);
        assert_eq!(summary.total_revenue, 10_000.0);
        assert_eq!(summary.average_order_value, 2500.0);
        assert_eq!(summary.delivered_rate, 0.25);
        assert_eq!(summary.cancelled_rate, 0.25);
        assert_eq!(summary.problem_count, 1);
        assert_eq!(summary.by_platform.get("cdek"), Some(&2));
        assert_eq!(summary.by_platform.get("megamarket"), Some(&2));
        assert_eq!(summary.by_status.get("delivered"), Some(&1));
    }

    #[test]
    fn test_daily_trend_grouped_and_sorted() {
        let orders = vec![
            order(Platform::Cdek, OrderStatus::New, 100.0, 3),
            order(Platform::Cdek, OrderStatus::New, 200.0, 1),
            order(Platform::Megamarket, OrderStatus::New, 300.0, 1),
        ];
        let summary = summarize(&orders);

        assert_eq!(summary.daily.len(), 2);
        // по возрастанию даты
        assert!(summary.daily[0].date < summary.daily[1].date);
        assert_eq!(summary.daily[0].orders, 2);
        assert_eq!(summary.daily[0].revenue, 500.0);
    }

    #[test]
    fn test_synthetic_orders_are_counted() {
        let mut synthetic = order(Platform::Cdek, OrderStatus::New, 100.0, 1);
        synthetic.provenance = DataProvenance::Synthetic;
        let live = order(Platform::Cdek, OrderStatus::New, 100.0, 1);

        let summary = summarize(&[synthetic, live]);
        assert_eq!(summary.synthetic_count, 1);
    }
}
