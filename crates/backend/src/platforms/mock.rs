use chrono::{Duration, Utc};
use contracts::domain::order::{
    CdekContact, CdekPayload, DataProvenance, MegamarketCustomer, MegamarketDelivery,
    MegamarketItem, MegamarketPayload, Order, OrderStatus, Platform,
};
use rand::Rng;

use super::{cdek, megamarket};

const CITIES: &[&str] = &[
    "Москва",
    "Санкт-Петербург",
    "Казань",
    "Новосибирск",
    "Екатеринбург",
    "Краснодар",
];

const NAMES: &[&str] = &[
    "Иванов Иван",
    "Петрова Анна",
    "Сидоров Алексей",
    "Кузнецова Мария",
    "Смирнов Дмитрий",
];

const PRODUCTS: &[&str] = &[
    "Смартфон Galaxy A15",
    "Наушники TWS Pro",
    "Чехол силиконовый",
    "Зарядное устройство 65Вт",
    "Кабель USB-C 2м",
    "Павербанк 20000 мАч",
];

/// Сырые коды статусов, из которых собираются mock-заказы.
/// Коды берутся из реальных таблиц платформ, чтобы нормализация
/// mock-данных шла тем же путём, что и боевых.
const CDEK_CODES: &[&str] = &[
    "CREATED",
    "ACCEPTED",
    "RECEIVED_AT_SHIPMENT_WAREHOUSE",
    "SENT_TO_TRANSIT_WAREHOUSE",
    "TAKEN_BY_COURIER",
    "DELIVERED",
];

const MEGAMARKET_CODES: &[&str] = &[
    "NEW",
    "CONFIRMED",
    "PACKED",
    "SHIPPED",
    "DELIVERED",
];

/// Сколько заказов генерировать при недоступном API: 3–8
pub fn mock_order_count() -> usize {
    rand::thread_rng().gen_range(3..=8)
}

/// Сгенерировать пачку синтетических заказов платформы
pub fn generate_mock_orders(platform: Platform, count: usize) -> Vec<Order> {
    (0..count)
        .map(|i| {
            let id = match platform {
                Platform::Cdek => format!("mock-cdek-{}", 1000 + i),
                Platform::Megamarket => format!("mock-mm-{}", 5000 + i),
            };
            mock_order(platform, &id)
        })
        .collect()
}

/// Один синтетический заказ с заданным id
pub fn mock_order(platform: Platform, id: &str) -> Order {
    let mut rng = rand::thread_rng();
    let status_code = match platform {
        Platform::Cdek => CDEK_CODES[rng.gen_range(0..CDEK_CODES.len())],
        Platform::Megamarket => MEGAMARKET_CODES[rng.gen_range(0..MEGAMARKET_CODES.len())],
    };
    let status = match platform {
        Platform::Cdek => cdek::map_status(status_code),
        Platform::Megamarket => megamarket::map_status(status_code),
    };
    let created = Utc::now() - Duration::minutes(rng.gen_range(30..60 * 72));
    let updated = created + Duration::minutes(rng.gen_range(5..600));
    let total_amount = rng.gen_range(500..15_000) as f64;

    let (cdek_payload, mm_payload) = match platform {
        Platform::Cdek => (Some(mock_cdek_payload(&mut rng)), None),
        Platform::Megamarket => (None, Some(mock_megamarket_payload(&mut rng, total_amount))),
    };

    Order {
        id: id.to_string(),
        platform,
        status,
        status_code: status_code.to_string(),
        created_date: created,
        updated_date: updated.min(Utc::now()),
        total_amount,
        provenance: DataProvenance::Synthetic,
        cdek: cdek_payload,
        megamarket: mm_payload,
    }
}

fn mock_cdek_payload(rng: &mut impl Rng) -> CdekPayload {
    CdekPayload {
        sender: Some(CdekContact {
            name: Some("ООО «ТехноЭдем»".to_string()),
            company: Some("ТехноЭдем".to_string()),
            phone: Some("+7 (495) 120-00-00".to_string()),
            city: Some("Москва".to_string()),
        }),
        recipient: Some(CdekContact {
            name: Some(NAMES[rng.gen_range(0..NAMES.len())].to_string()),
            company: None,
            phone: Some(format!("+7 (9{:02}) {:03}-00-00", rng.gen_range(0..100), rng.gen_range(100..1000))),
            city: Some(CITIES[rng.gen_range(0..CITIES.len())].to_string()),
        }),
        tariff_code: Some([136, 137, 368][rng.gen_range(0..3)]),
        delivery_point: None,
        extra: Default::default(),
    }
}

fn mock_megamarket_payload(rng: &mut impl Rng, total_amount: f64) -> MegamarketPayload {
    let quantity = rng.gen_range(1..4);
    MegamarketPayload {
        items: vec![MegamarketItem {
            name: PRODUCTS[rng.gen_range(0..PRODUCTS.len())].to_string(),
            offer_id: Some(format!("SKU-{}", rng.gen_range(10_000..99_999))),
            quantity,
            price: (total_amount / quantity as f64 * 100.0).round() / 100.0,
        }],
        customer: Some(MegamarketCustomer {
            full_name: Some(NAMES[rng.gen_range(0..NAMES.len())].to_string()),
            phone: Some(format!("+7 (9{:02}) {:03}-00-00", rng.gen_range(0..100), rng.gen_range(100..1000))),
        }),
        delivery: Some(MegamarketDelivery {
            address: Some(format!(
                "{}, ул. Ленина, д. {}",
                CITIES[rng.gen_range(0..CITIES.len())],
                rng.gen_range(1..120)
            )),
            delivery_date: Some((Utc::now() + Duration::days(rng.gen_range(1..5))).format("%Y-%m-%d").to_string()),
            delivery_type: Some("COURIER".to_string()),
        }),
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_order_count_bounds() {
        for _ in 0..200 {
            let n = mock_order_count();
            assert!((3..=8).contains(&n), "вне диапазона: {}", n);
        }
    }

    #[test]
    fn test_mock_orders_are_synthetic_and_consistent() {
        let orders = generate_mock_orders(Platform::Cdek, 5);
        assert_eq!(orders.len(), 5);
        for order in &orders {
            assert_eq!(order.platform, Platform::Cdek);
            assert_eq!(order.provenance, DataProvenance::Synthetic);
            assert!(order.total_amount >= 0.0);
            assert!(order.cdek.is_some());
            assert!(order.megamarket.is_none());
            // статус выводится из сырого кода той же таблицей
            assert_eq!(order.status, cdek::map_status(&order.status_code));
            assert!(order.created_date <= order.updated_date);
        }
    }

    #[test]
    fn test_mock_order_keeps_requested_id() {
        let order = mock_order(Platform::Megamarket, "A-123");
        assert_eq!(order.id, "A-123");
        assert!(order.megamarket.is_some());
        let payload = order.megamarket.unwrap();
        assert!(!payload.items.is_empty());
    }

    #[test]
    fn test_mock_statuses_are_known_to_normalizer() {
        // кроме CREATED (честный "new"), коды mock-генератора не должны
        // сваливаться в default-ветку нормализатора
        for code in CDEK_CODES.iter().filter(|c| **c != "CREATED") {
            assert_ne!(cdek::map_status(code), OrderStatus::New, "код {}", code);
        }
        for code in MEGAMARKET_CODES.iter().filter(|c| **c != "NEW") {
            assert_ne!(megamarket::map_status(code), OrderStatus::New, "код {}", code);
        }
    }
}
