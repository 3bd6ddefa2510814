use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use super::SyncManager;

/// Фоновый воркер периодической синхронизации.
///
/// Пропущенные тики не навёрстываются: если цикл шёл дольше интервала,
/// следующий запуск просто ждёт очередного тика.
pub struct AutoSyncWorker {
    manager: Arc<SyncManager>,
    interval_seconds: u64,
    paused: AtomicBool,
}

impl AutoSyncWorker {
    pub fn new(manager: Arc<SyncManager>, interval_seconds: u64) -> Self {
        Self {
            manager,
            interval_seconds,
            paused: AtomicBool::new(false),
        }
    }

    pub fn pause(&self) {
        info!("Автосинхронизация приостановлена");
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        info!("Автосинхронизация возобновлена");
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Запускает бесконечный цикл синхронизации.
    pub async fn run_loop(&self) {
        info!(
            "Автосинхронизация запущена с интервалом {} секунд",
            self.interval_seconds
        );
        let mut interval = time::interval(time::Duration::from_secs(self.interval_seconds));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // первый тик срабатывает мгновенно: стартовая синхронизация
        loop {
            interval.tick().await;
            if self.is_paused() {
                continue;
            }
            match self.manager.sync_all().await {
                Ok(Some(report)) => {
                    info!("Автосинхронизация: цикл завершён со статусом {:?}", report.status);
                }
                Ok(None) => {
                    info!("Автосинхронизация: пропуск, цикл уже выполняется");
                }
                Err(e) => {
                    error!("Автосинхронизация: ошибка цикла: {:?}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::db;
    use crate::shared::logger::EventLog;
    use crate::shared::storage::StorageAdapter;
    use contracts::domain::sync::MergePolicy;

    async fn worker() -> AutoSyncWorker {
        let conn = db::connect_in_memory().await.unwrap();
        db::ensure_schema(&conn).await.unwrap();
        let storage = Arc::new(StorageAdapter::new(conn.clone(), "test:", false));
        let manager = Arc::new(SyncManager::new(
            Vec::new(),
            storage,
            EventLog::new(conn),
            MergePolicy::Replace,
            24,
        ));
        AutoSyncWorker::new(manager, 600)
    }

    #[tokio::test]
    async fn test_pause_resume() {
        let worker = worker().await;
        assert!(!worker.is_paused());
        worker.pause();
        assert!(worker.is_paused());
        worker.resume();
        assert!(!worker.is_paused());
    }
}
