use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::domain::order::{
    DataProvenance, MegamarketCustomer, MegamarketDelivery, MegamarketItem, MegamarketPayload,
    Order, OrderStatus, Platform,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

use crate::shared::config::MegamarketConfig;

use super::{mock, AuthToken, FetchOutcome, OrderFilter, PlatformClient, PlatformError, TestConnectionResult};

/// HTTP-клиент для работы с API Мегамаркета.
///
/// API авторизуется токеном в теле запроса, все операции — POST под
/// версионированным префиксом /api/market/v1/orderService.
pub struct MegamarketClient {
    client: reqwest::Client,
    config: MegamarketConfig,
    allow_synthetic: bool,
}

/// Таблица соответствия кодов статусов Мегамаркета каноническим.
/// Неизвестный код даёт "new".
pub fn map_status(code: &str) -> OrderStatus {
    match code {
        "NEW" => OrderStatus::New,
        "CONFIRMED" => OrderStatus::Processing,
        "PACKING" => OrderStatus::Processing,
        "PACKED" => OrderStatus::Packed,
        "SHIPPING" => OrderStatus::InTransit,
        "SHIPPED" => OrderStatus::Shipped,
        "DELIVERED" => OrderStatus::Delivered,
        "CANCELED" => OrderStatus::Cancelled,
        "CUSTOMER_CANCELED" => OrderStatus::Cancelled,
        "MERCHANT_CANCELED" => OrderStatus::Cancelled,
        "CLIENT_REFUSED" => OrderStatus::Problem,
        "DISPUTE" => OrderStatus::Problem,
        _ => OrderStatus::New,
    }
}

impl MegamarketClient {
    pub fn new(config: MegamarketConfig, allow_synthetic: bool) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            config,
            allow_synthetic,
        }
    }

    fn has_credentials(&self) -> bool {
        !self.config.token.trim().is_empty()
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/api/market/v1/orderService/order/{}",
            self.config.base_url, operation
        )
    }

    async fn post_json(
        &self,
        operation: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let url = self.endpoint(operation);
        let body = json!({ "data": data, "meta": {} });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                "Мегамаркет: {} вернул HTTP {}: {}",
                operation,
                status.as_u16(),
                text
            );
            anyhow::bail!("Megamarket {} failed with status {}", operation, status);
        }
        Ok(response.json().await?)
    }

    fn normalize(&self, raw: &MmRawShipment, provenance: DataProvenance) -> Order {
        let status_code = raw.status.clone().unwrap_or_else(|| "NEW".to_string());
        let created = raw.creation_date.unwrap_or_else(Utc::now);
        let total_amount: f64 = if raw.items.is_empty() {
            raw.total.unwrap_or(0.0)
        } else {
            raw.total.unwrap_or_else(|| {
                raw.items
                    .iter()
                    .map(|i| i.final_price.unwrap_or(0.0) * i.quantity.unwrap_or(1) as f64)
                    .sum()
            })
        };

        Order {
            id: raw
                .shipment_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            platform: Platform::Megamarket,
            status: map_status(&status_code),
            status_code,
            created_date: created,
            updated_date: raw.status_date.unwrap_or(created),
            total_amount: total_amount.max(0.0),
            provenance,
            cdek: None,
            megamarket: Some(MegamarketPayload {
                items: raw
                    .items
                    .iter()
                    .map(|i| MegamarketItem {
                        name: i.goods_name.clone().unwrap_or_else(|| "Без названия".to_string()),
                        offer_id: i.offer_id.clone(),
                        quantity: i.quantity.unwrap_or(1),
                        price: i.final_price.unwrap_or(0.0),
                    })
                    .collect(),
                customer: raw.customer.as_ref().map(|c| MegamarketCustomer {
                    full_name: c.customer_full_name.clone(),
                    phone: c.phone.clone(),
                }),
                delivery: raw.delivery.as_ref().map(|d| MegamarketDelivery {
                    address: d.address.clone(),
                    delivery_date: d.delivery_date.clone(),
                    delivery_type: d.delivery_type.clone(),
                }),
                extra: raw.extra.clone(),
            }),
        }
    }

    async fn fetch_orders(&self, filter: &OrderFilter) -> anyhow::Result<Vec<Order>> {
        if !self.has_credentials() {
            anyhow::bail!("Мегамаркет: токен не задан");
        }

        let body = self
            .post_json(
                "search",
                json!({
                    "token": self.config.token,
                    "dateFrom": filter.date_from.to_rfc3339(),
                    "dateTo": filter.date_to.to_rfc3339(),
                    "count": filter.page_size,
                }),
            )
            .await?;

        let envelope: MmSearchResponse = serde_json::from_value(body).map_err(|e| {
            tracing::error!("Мегамаркет: не удалось разобрать список заказов: {}", e);
            anyhow::anyhow!("Failed to parse Megamarket search response: {}", e)
        })?;

        Ok(envelope
            .data
            .shipments
            .iter()
            .map(|raw| self.normalize(raw, DataProvenance::Live))
            .collect())
    }

    /// Общий путь мутаций: POST, затем проверка success-индикации.
    async fn mutate(&self, operation: &'static str, data: serde_json::Value) -> Result<(), PlatformError> {
        let body = self
            .post_json(operation, data)
            .await
            .map_err(|e| PlatformError::Transport {
                platform: Platform::Megamarket,
                message: e.to_string(),
            })?;

        check_mutation_response(&body)
    }

    /// Подтвердить сборку заказа
    pub async fn pack_order(&self, shipment_id: &str) -> Result<(), PlatformError> {
        tracing::info!("Мегамаркет: упаковка заказа {}", shipment_id);
        self.mutate(
            "packing",
            json!({
                "token": self.config.token,
                "shipments": [{"shipmentId": shipment_id}],
            }),
        )
        .await
    }

    /// Передать заказ в доставку (закрыть со стороны продавца)
    pub async fn close_order(&self, shipment_id: &str) -> Result<(), PlatformError> {
        tracing::info!("Мегамаркет: отгрузка заказа {}", shipment_id);
        self.mutate(
            "shipping",
            json!({
                "token": self.config.token,
                "shipments": [{"shipmentId": shipment_id}],
            }),
        )
        .await
    }

    /// Подтвердить заказ с переносом даты отгрузки
    pub async fn confirm_order_with_new_date(
        &self,
        shipment_id: &str,
        new_date: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        tracing::info!(
            "Мегамаркет: подтверждение заказа {} с новой датой {}",
            shipment_id,
            new_date.format("%Y-%m-%d")
        );
        self.mutate(
            "confirm",
            json!({
                "token": self.config.token,
                "shipments": [{
                    "shipmentId": shipment_id,
                    "shippingDate": new_date.to_rfc3339(),
                }],
            }),
        )
        .await
    }
}

#[async_trait]
impl PlatformClient for MegamarketClient {
    fn platform(&self) -> Platform {
        Platform::Megamarket
    }

    async fn authenticate(&self) -> anyhow::Result<AuthToken> {
        if !self.has_credentials() {
            tracing::warn!("Мегамаркет: токен не задан, используется mock-токен");
            return Ok(AuthToken::mock());
        }
        // API-токен Мегамаркета не имеет срока жизни на нашей стороне;
        // часовая валидность заставляет периодически перепроверять конфиг
        Ok(AuthToken::new(self.config.token.clone(), 3600))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> anyhow::Result<FetchOutcome> {
        match self.fetch_orders(filter).await {
            Ok(orders) => {
                tracing::info!("Мегамаркет: получено {} заказов", orders.len());
                Ok(FetchOutcome {
                    orders,
                    provenance: DataProvenance::Live,
                })
            }
            Err(e) if self.allow_synthetic => {
                tracing::warn!(
                    "Мегамаркет: чтение заказов не удалось ({}), выданы mock-данные",
                    e
                );
                Ok(FetchOutcome {
                    orders: mock::generate_mock_orders(
                        Platform::Megamarket,
                        mock::mock_order_count(),
                    ),
                    provenance: DataProvenance::Synthetic,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn get_order(&self, id: &str) -> anyhow::Result<Order> {
        let attempt: anyhow::Result<Order> = async {
            if !self.has_credentials() {
                anyhow::bail!("Мегамаркет: токен не задан");
            }
            let body = self
                .post_json(
                    "get",
                    json!({
                        "token": self.config.token,
                        "shipments": [id],
                    }),
                )
                .await?;
            let envelope: MmSearchResponse = serde_json::from_value(body)?;
            let raw = envelope
                .data
                .shipments
                .first()
                .ok_or_else(|| anyhow::anyhow!("Заказ {} не найден в ответе", id))?;
            Ok(self.normalize(raw, DataProvenance::Live))
        }
        .await;

        match attempt {
            Ok(order) => Ok(order),
            Err(e) if self.allow_synthetic => {
                tracing::warn!("Мегамаркет: заказ {} недоступен ({}), выдан mock", id, e);
                Ok(mock::mock_order(Platform::Megamarket, id))
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_order(&self, id: &str, reason: &str) -> Result<(), PlatformError> {
        tracing::info!("Мегамаркет: отмена заказа {} (причина: {})", id, reason);
        self.mutate(
            "cancel",
            json!({
                "token": self.config.token,
                "shipments": [{
                    "shipmentId": id,
                    "reason": reason,
                }],
            }),
        )
        .await
    }

    async fn test_connection(&self) -> TestConnectionResult {
        if !self.has_credentials() {
            return TestConnectionResult {
                success: false,
                message: "API токен не может быть пустым".into(),
                details: None,
            };
        }

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                return TestConnectionResult {
                    success: false,
                    message: "Ошибка создания HTTP клиента".into(),
                    details: Some(format!("{}", e)),
                }
            }
        };

        // лёгкий поисковый запрос как проверка валидности токена
        let url = self.endpoint("search");
        let body = json!({
            "data": {"token": self.config.token, "count": 1},
            "meta": {}
        });

        let response = match client.post(&url).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let message = if e.is_timeout() {
                    "Превышено время ожидания ответа от API Мегамаркета (>10 сек)".to_string()
                } else if e.is_connect() {
                    format!("Не удалось установить соединение с API Мегамаркета: {}", e)
                } else {
                    format!("Неизвестная ошибка: {}", e)
                };
                return TestConnectionResult {
                    success: false,
                    message,
                    details: Some(format!("URL: {}, Ошибка: {:?}", url, e)),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return TestConnectionResult {
                success: false,
                message: format!("API Мегамаркета вернул ошибку (HTTP {})", status.as_u16()),
                details: Some(error_text),
            };
        }

        match response.json::<serde_json::Value>().await {
            Ok(value) => {
                if is_success_indicated(&value) {
                    TestConnectionResult {
                        success: true,
                        message: "Подключение к Мегамаркету успешно установлено".into(),
                        details: Some("API токен валиден".into()),
                    }
                } else {
                    TestConnectionResult {
                        success: false,
                        message: "API Мегамаркета не подтвердил валидность токена".into(),
                        details: extract_mm_error(&value),
                    }
                }
            }
            Err(e) => TestConnectionResult {
                success: false,
                message: "Ответ API Мегамаркета не является валидным JSON".into(),
                details: Some(format!("{}", e)),
            },
        }
    }
}

fn is_success_indicated(body: &serde_json::Value) -> bool {
    match body.get("success") {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
        _ => body.get("status").and_then(|s| s.as_str()) == Some("success"),
    }
}

fn extract_mm_error(body: &serde_json::Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| body.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

/// Проверка ответа мутации: без явной success-индикации операция
/// считается отклонённой, с сообщением API если оно есть.
pub fn check_mutation_response(body: &serde_json::Value) -> Result<(), PlatformError> {
    if is_success_indicated(body) {
        Ok(())
    } else {
        Err(PlatformError::Api {
            platform: Platform::Megamarket,
            message: extract_mm_error(body)
                .unwrap_or_else(|| "API не подтвердил выполнение операции".to_string()),
        })
    }
}

// ============================================================================
// Response structures для API Мегамаркета
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct MmSearchResponse {
    #[serde(default)]
    data: MmSearchData,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MmSearchData {
    #[serde(default)]
    shipments: Vec<MmRawShipment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmRawShipment {
    #[serde(default, rename = "shipmentId")]
    pub shipment_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "creationDate")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "statusDate")]
    pub status_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub items: Vec<MmRawItem>,
    #[serde(default)]
    pub customer: Option<MmRawCustomer>,
    #[serde(default)]
    pub delivery: Option<MmRawDelivery>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmRawItem {
    #[serde(default, rename = "goodsName")]
    pub goods_name: Option<String>,
    #[serde(default, rename = "offerId")]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default, rename = "finalPrice")]
    pub final_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmRawCustomer {
    #[serde(default, rename = "customerFullName")]
    pub customer_full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmRawDelivery {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "deliveryDate")]
    pub delivery_date: Option<String>,
    #[serde(default, rename = "deliveryType")]
    pub delivery_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(token: &str) -> MegamarketClient {
        MegamarketClient::new(
            MegamarketConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                token: token.to_string(),
                timeout_secs: 1,
            },
            true,
        )
    }

    #[test]
    fn test_status_table_is_total() {
        let known = [
            ("NEW", OrderStatus::New),
            ("CONFIRMED", OrderStatus::Processing),
            ("PACKING", OrderStatus::Processing),
            ("PACKED", OrderStatus::Packed),
            ("SHIPPING", OrderStatus::InTransit),
            ("SHIPPED", OrderStatus::Shipped),
            ("DELIVERED", OrderStatus::Delivered),
            ("CANCELED", OrderStatus::Cancelled),
            ("CUSTOMER_CANCELED", OrderStatus::Cancelled),
            ("MERCHANT_CANCELED", OrderStatus::Cancelled),
            ("CLIENT_REFUSED", OrderStatus::Problem),
            ("DISPUTE", OrderStatus::Problem),
        ];
        for (code, expected) in known {
            assert_eq!(map_status(code), expected, "код {}", code);
        }
        assert_eq!(map_status("UNKNOWN_CODE"), OrderStatus::New);
    }

    #[test]
    fn test_mutation_response_without_success_is_error() {
        // нет ни success, ни status:success — это отказ
        let err = check_mutation_response(&serde_json::json!({"data": {}})).unwrap_err();
        assert!(matches!(err, PlatformError::Api { .. }));

        let err = check_mutation_response(&serde_json::json!({
            "success": 0,
            "error": {"message": "Отгрузка уже подтверждена"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Отгрузка уже подтверждена"));
    }

    #[test]
    fn test_mutation_response_success_variants() {
        assert!(check_mutation_response(&serde_json::json!({"success": 1})).is_ok());
        assert!(check_mutation_response(&serde_json::json!({"success": true})).is_ok());
        assert!(check_mutation_response(&serde_json::json!({"status": "success"})).is_ok());
    }

    #[tokio::test]
    async fn test_authenticate_without_token_returns_mock() {
        let client = test_client("");
        let token = client.authenticate().await.unwrap();
        assert!(token.is_mock());
    }

    #[tokio::test]
    async fn test_list_orders_degrades_to_mock() {
        let client = test_client("");
        let filter = OrderFilter::for_range(Utc::now() - chrono::Duration::hours(24), Utc::now());
        let outcome = client.list_orders(&filter).await.unwrap();

        assert_eq!(outcome.provenance, DataProvenance::Synthetic);
        assert!((3..=8).contains(&outcome.orders.len()));
        assert!(outcome
            .orders
            .iter()
            .all(|o| o.platform == Platform::Megamarket));
    }

    #[tokio::test]
    async fn test_cancel_against_unreachable_api_is_transport_error() {
        // записи не деградируют: транспортная ошибка доходит до вызывающего
        let client = test_client("tok");
        let err = client.cancel_order("S-1", "по просьбе покупателя").await.unwrap_err();
        assert!(matches!(err, PlatformError::Transport { .. }));
    }

    #[test]
    fn test_normalize_computes_total_from_items() {
        let client = test_client("tok");
        let raw: MmRawShipment = serde_json::from_value(serde_json::json!({
            "shipmentId": "398021394",
            "status": "PACKED",
            "creationDate": "2026-08-20T08:30:00Z",
            "items": [
                {"goodsName": "Наушники TWS Pro", "quantity": 2, "finalPrice": 1500.0},
                {"goodsName": "Кабель USB-C 2м", "quantity": 1, "finalPrice": 300.0}
            ],
            "customer": {"customerFullName": "Кузнецова Мария", "phone": "+79991112233"},
            "fulfillmentMethod": "FBS"
        }))
        .unwrap();

        let order = client.normalize(&raw, DataProvenance::Live);
        assert_eq!(order.id, "398021394");
        assert_eq!(order.status, OrderStatus::Packed);
        assert_eq!(order.total_amount, 3300.0);

        let payload = order.megamarket.expect("payload должен сохраниться");
        assert_eq!(payload.items.len(), 2);
        assert!(payload.extra.contains_key("fulfillmentMethod"));
    }
}
