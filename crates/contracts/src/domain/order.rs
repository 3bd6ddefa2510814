use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Платформа-источник заказа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Cdek,
    Megamarket,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Cdek => "cdek",
            Platform::Megamarket => "megamarket",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "cdek" | "сдэк" => Some(Platform::Cdek),
            "megamarket" | "mm" | "мегамаркет" => Some(Platform::Megamarket),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Нормализованный статус заказа.
///
/// Сырые коды платформ приводятся к этому перечислению фиксированными
/// таблицами соответствия. Неизвестный код всегда даёт `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Processing,
    Packed,
    InTransit,
    Shipped,
    Delivered,
    Cancelled,
    Problem,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Processing => "processing",
            OrderStatus::Packed => "packed",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Problem => "problem",
        }
    }

    /// Терминальные статусы: заказ больше не меняется
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Problem
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Происхождение данных заказа.
///
/// `Synthetic` означает, что реальный API был недоступен и запись
/// сгенерирована как заглушка. UI может показывать это явно.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataProvenance {
    Live,
    Cached,
    Synthetic,
}

/// Контакт (отправитель/получатель) в заказе СДЭК
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdekContact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Платформенный payload СДЭК, сохраняется при нормализации
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdekPayload {
    #[serde(default)]
    pub sender: Option<CdekContact>,
    #[serde(default)]
    pub recipient: Option<CdekContact>,
    /// Номер тарифа СДЭК
    #[serde(default)]
    pub tariff_code: Option<i32>,
    #[serde(default)]
    pub delivery_point: Option<String>,
    /// Прочие поля ответа API, которые мы не разбираем
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Позиция заказа Мегамаркета
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MegamarketItem {
    pub name: String,
    #[serde(default)]
    pub offer_id: Option<String>,
    pub quantity: i32,
    pub price: f64,
}

/// Покупатель в заказе Мегамаркета
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MegamarketCustomer {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Доставка в заказе Мегамаркета
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MegamarketDelivery {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub delivery_type: Option<String>,
}

/// Платформенный payload Мегамаркета, сохраняется при нормализации
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MegamarketPayload {
    #[serde(default)]
    pub items: Vec<MegamarketItem>,
    #[serde(default)]
    pub customer: Option<MegamarketCustomer>,
    #[serde(default)]
    pub delivery: Option<MegamarketDelivery>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Единая форма заказа, результат нормализации ответов обеих платформ.
///
/// `status` всегда выводится из `status_code` фиксированной таблицей;
/// сырой код сохраняется для трассировки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub platform: Platform,
    pub status: OrderStatus,
    pub status_code: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    /// Сумма заказа в рублях, неотрицательная
    pub total_amount: f64,
    pub provenance: DataProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdek: Option<CdekPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub megamarket: Option<MegamarketPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Platform::Cdek).unwrap(),
            "\"cdek\""
        );
        assert_eq!(
            serde_json::to_string(&Platform::Megamarket).unwrap(),
            "\"megamarket\""
        );
    }

    #[test]
    fn test_platform_from_code() {
        assert_eq!(Platform::from_code("CDEK"), Some(Platform::Cdek));
        assert_eq!(Platform::from_code("мегамаркет"), Some(Platform::Megamarket));
        assert_eq!(Platform::from_code("ozon"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Problem.is_terminal());
        assert!(!OrderStatus::InTransit.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
    }
}
