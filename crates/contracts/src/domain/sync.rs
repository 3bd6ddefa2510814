use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::{DataProvenance, Platform};

/// Итоговый статус цикла синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Все платформы ответили
    Success,
    /// Часть платформ ответила, часть упала
    Warning,
    /// Ни одна платформа не ответила
    Error,
}

/// Политика слияния результатов одной платформы в общую коллекцию.
///
/// Исторически использовалась только полная замена; политика вынесена
/// в конфигурацию, потому что замена молча теряет заказы при частичной
/// выборке.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Полностью заменить подмножество платформы новым списком
    #[default]
    Replace,
    /// Обновить существующие записи по id, добавить новые
    Upsert,
    /// Объединение: ничего не удалять, только добавлять и обновлять
    Union,
}

/// Результат синхронизации одной платформы
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSyncResult {
    pub platform: Platform,
    pub ok: bool,
    /// Сколько заказов получено (0 при ошибке)
    pub fetched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<DataProvenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Отчёт об одном цикле синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub platforms: Vec<PlatformSyncResult>,
}

impl SyncReport {
    /// Статус из числа успешных/упавших платформ
    pub fn status_from_counts(fulfilled: usize, rejected: usize) -> SyncStatus {
        if rejected == 0 {
            SyncStatus::Success
        } else if fulfilled > 0 {
            SyncStatus::Warning
        } else {
            SyncStatus::Error
        }
    }
}

/// Текущее состояние синхронизации, отдаётся в UI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub in_progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(SyncReport::status_from_counts(2, 0), SyncStatus::Success);
        assert_eq!(SyncReport::status_from_counts(1, 1), SyncStatus::Warning);
        assert_eq!(SyncReport::status_from_counts(0, 2), SyncStatus::Error);
    }

    #[test]
    fn test_merge_policy_default_is_replace() {
        assert_eq!(MergePolicy::default(), MergePolicy::Replace);
    }
}
