pub mod repository;

use sea_orm::DatabaseConnection;

/// Серверный журнал событий поверх таблицы system_log.
///
/// # Примеры
/// ```
/// log.log("sync", "Синхронизация завершена");
/// log.log("api", "Получен запрос к /api/orders");
/// ```
#[derive(Debug, Clone)]
pub struct EventLog {
    conn: DatabaseConnection,
}

impl EventLog {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Записать событие, не дожидаясь вставки
    pub fn log(&self, category: &str, message: &str) {
        let conn = self.conn.clone();
        let category = category.to_string();
        let message = message.to_string();

        tokio::spawn(async move {
            if let Err(e) = repository::log_event(&conn, "server", &category, &message).await {
                eprintln!("Failed to log event: {}", e);
            }
        });
    }

    pub async fn log_event(&self, source: &str, category: &str, message: &str) -> anyhow::Result<()> {
        repository::log_event(&self.conn, source, category, message).await
    }

    pub async fn list_all(&self) -> anyhow::Result<Vec<contracts::shared::logger::LogEntry>> {
        repository::get_all_logs(&self.conn).await
    }

    pub async fn clear_all(&self) -> anyhow::Result<()> {
        repository::clear_all_logs(&self.conn).await
    }
}
