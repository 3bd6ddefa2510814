pub mod cdek;
pub mod megamarket;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use contracts::domain::order::{DataProvenance, Order, Platform};

/// Ошибка мутирующей операции платформы.
///
/// Чтения деградируют до mock-данных и таких ошибок не порождают;
/// запись обязана падать громко — молча "отменить" заказ нельзя.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// API ответил, но не подтвердил успех операции
    #[error("{platform}: API отклонил операцию: {message}")]
    Api { platform: Platform, message: String },
    /// Сеть/таймаут/не-2xx без разбираемого тела
    #[error("{platform}: транспортная ошибка: {message}")]
    Transport { platform: Platform, message: String },
    /// Операция не поддерживается этой платформой
    #[error("{platform}: операция '{operation}' не поддерживается")]
    Unsupported {
        platform: Platform,
        operation: &'static str,
    },
}

/// Токен авторизации платформы
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Запас до фактического истечения, после которого токен обновляется
const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

/// Время жизни mock-токена
const MOCK_TOKEN_TTL_SECS: i64 = 3600;

impl AuthToken {
    pub fn new(token: String, expires_in_secs: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    /// Синтетический токен вида `mock-token-<timestamp>`, выдаётся когда
    /// реальная аутентификация невозможна. UI при этом продолжает жить.
    pub fn mock() -> Self {
        Self::new(
            format!("mock-token-{}", Utc::now().timestamp_millis()),
            MOCK_TOKEN_TTL_SECS,
        )
    }

    pub fn is_mock(&self) -> bool {
        self.token.starts_with("mock-token-")
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at - Duration::seconds(TOKEN_SAFETY_MARGIN_SECS)
    }
}

/// Параметры выборки заказов
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub page: u32,
    pub page_size: u32,
}

impl OrderFilter {
    pub fn for_range(date_from: DateTime<Utc>, date_to: DateTime<Utc>) -> Self {
        Self {
            date_from,
            date_to,
            page: 0,
            page_size: 100,
        }
    }
}

/// Результат чтения с пометкой происхождения данных
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub orders: Vec<Order>,
    pub provenance: DataProvenance,
}

/// Результат тестирования подключения к платформе
#[derive(Debug, Clone)]
pub struct TestConnectionResult {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

/// Общий интерфейс клиента платформы.
///
/// Операции записи, специфичные для одной платформы (упаковка,
/// отгрузка, перенос даты), живут inherent-методами конкретных
/// клиентов; сюда входит только то, что нужно циклу синхронизации.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Получить действующий токен. Никогда не падает: при отсутствии
    /// учётных данных или ошибке сети возвращается mock-токен.
    async fn authenticate(&self) -> anyhow::Result<AuthToken>;

    /// Список заказов за период. За границу клиента транспортные ошибки
    /// не выходят: при сбое возвращаются синтетические данные, либо
    /// ошибка офлайна, если синтетика запрещена конфигурацией.
    async fn list_orders(&self, filter: &OrderFilter) -> anyhow::Result<FetchOutcome>;

    /// Один заказ; при сбое — синтетический заказ с запрошенным id
    async fn get_order(&self, id: &str) -> anyhow::Result<Order>;

    /// Отмена заказа. Ошибки доходят до вызывающего.
    async fn cancel_order(&self, id: &str, reason: &str) -> Result<(), PlatformError>;

    async fn test_connection(&self) -> TestConnectionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_token_shape_and_ttl() {
        let token = AuthToken::mock();
        assert!(token.token.starts_with("mock-token-"));
        assert!(token.is_mock());

        let remaining = token.expires_at - Utc::now();
        assert!(remaining > Duration::seconds(3590));
        assert!(remaining <= Duration::seconds(3600));
    }

    #[test]
    fn test_token_safety_margin() {
        // токен формально жив ещё 30 секунд, но уже невалиден из-за запаса
        let token = AuthToken::new("t".to_string(), 30);
        assert!(!token.is_valid());

        let token = AuthToken::new("t".to_string(), 3600);
        assert!(token.is_valid());
    }
}
