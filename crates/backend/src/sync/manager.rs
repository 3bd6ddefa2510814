use chrono::{DateTime, Duration, Utc};
use contracts::domain::order::{DataProvenance, Order, Platform};
use contracts::domain::sync::{
    MergePolicy, PlatformSyncResult, SyncReport, SyncState, SyncStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::platforms::{OrderFilter, PlatformClient};
use crate::shared::logger::EventLog;
use crate::shared::storage::StorageAdapter;

/// Ключ отметки последней синхронизации в хранилище
const LAST_SYNC_KEY: &str = "last_sync";
/// Ключ снимка коллекции заказов
const SNAPSHOT_KEY: &str = "orders_snapshot";

/// Оркестратор синхронизации заказов со всех платформ.
///
/// Держит общую коллекцию заказов в памяти и снимок в хранилище.
/// Повторный запуск во время идущей синхронизации игнорируется, а не
/// ставится в очередь.
pub struct SyncManager {
    platforms: Vec<Arc<dyn PlatformClient>>,
    storage: Arc<StorageAdapter>,
    event_log: EventLog,
    orders: RwLock<Vec<Order>>,
    last_report: RwLock<Option<SyncReport>>,
    state: RwLock<SyncState>,
    is_syncing: AtomicBool,
    merge_policy: MergePolicy,
    lookback_hours: i64,
}

impl SyncManager {
    pub fn new(
        platforms: Vec<Arc<dyn PlatformClient>>,
        storage: Arc<StorageAdapter>,
        event_log: EventLog,
        merge_policy: MergePolicy,
        lookback_hours: i64,
    ) -> Self {
        Self {
            platforms,
            storage,
            event_log,
            orders: RwLock::new(Vec::new()),
            last_report: RwLock::new(None),
            state: RwLock::new(SyncState::default()),
            is_syncing: AtomicBool::new(false),
            merge_policy,
            lookback_hours,
        }
    }

    /// Текущая коллекция заказов
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    pub async fn state(&self) -> SyncState {
        let mut state = self.state.read().await.clone();
        state.in_progress = self.is_syncing.load(Ordering::SeqCst);
        state
    }

    /// Восстановить коллекцию из снимка при старте.
    ///
    /// Восстановленные заказы помечаются как кэшированные: они могли
    /// устареть с момента последней синхронизации.
    pub async fn restore_snapshot(&self) -> anyhow::Result<usize> {
        let snapshot: Vec<Order> = self.storage.get_or(SNAPSHOT_KEY, Vec::new()).await?;
        let count = snapshot.len();
        if count > 0 {
            let mut orders = self.orders.write().await;
            *orders = snapshot
                .into_iter()
                .map(|mut o| {
                    if o.provenance == DataProvenance::Live {
                        o.provenance = DataProvenance::Cached;
                    }
                    o
                })
                .collect();
            tracing::info!("Синхронизация: восстановлено {} заказов из снимка", count);
        }
        Ok(count)
    }

    /// Отметка последней синхронизации; по умолчанию сутки назад
    pub async fn last_sync_since(&self) -> anyhow::Result<DateTime<Utc>> {
        let default = Utc::now() - Duration::hours(self.lookback_hours);
        self.storage.get_or(LAST_SYNC_KEY, default).await
    }

    /// Полный цикл синхронизации всех платформ.
    ///
    /// Возвращает `Ok(None)`, если цикл уже идёт. Платформы опрашиваются
    /// параллельно; падение одной не прерывает остальные. Отметка
    /// последней синхронизации обновляется всегда, даже при ошибках,
    /// чтобы не перечитывать один и тот же период бесконечно.
    pub async fn sync_all(&self) -> anyhow::Result<Option<SyncReport>> {
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Синхронизация уже выполняется, запрос проигнорирован");
            return Ok(None);
        }

        let report = self.run_cycle().await;
        self.is_syncing.store(false, Ordering::SeqCst);

        let report = report?;
        Ok(Some(report))
    }

    async fn run_cycle(&self) -> anyhow::Result<SyncReport> {
        let started_at = Utc::now();
        let date_from = self.last_sync_since().await?;
        let filter = OrderFilter::for_range(date_from, started_at);

        tracing::info!(
            "Синхронизация: запуск для {} платформ, период с {}",
            self.platforms.len(),
            date_from.format("%d.%m.%Y %H:%M")
        );

        let mut set: JoinSet<(Platform, anyhow::Result<crate::platforms::FetchOutcome>)> =
            JoinSet::new();
        for client in &self.platforms {
            let client = Arc::clone(client);
            let filter = filter.clone();
            set.spawn(async move {
                let platform = client.platform();
                (platform, client.list_orders(&filter).await)
            });
        }

        let mut results = Vec::with_capacity(self.platforms.len());
        let mut fetched: Vec<(Platform, Vec<Order>)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((platform, Ok(outcome))) => {
                    tracing::info!(
                        "Синхронизация: {} — {} заказов ({:?})",
                        platform,
                        outcome.orders.len(),
                        outcome.provenance
                    );
                    results.push(PlatformSyncResult {
                        platform,
                        ok: true,
                        fetched: outcome.orders.len(),
                        provenance: Some(outcome.provenance),
                        error: None,
                    });
                    fetched.push((platform, outcome.orders));
                }
                Ok((platform, Err(e))) => {
                    tracing::error!("Синхронизация: {} — ошибка: {}", platform, e);
                    results.push(PlatformSyncResult {
                        platform,
                        ok: false,
                        fetched: 0,
                        provenance: None,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => {
                    // паника внутри задачи платформы
                    tracing::error!("Синхронизация: задача платформы завершилась аварийно: {}", e);
                }
            }
        }

        let fulfilled = results.iter().filter(|r| r.ok).count();
        let rejected = results.len().saturating_sub(fulfilled);
        let status = SyncReport::status_from_counts(fulfilled, rejected);

        self.merge_fetched(fetched).await;
        self.persist_snapshot().await;

        // отметка обновляется безусловно
        let finished_at = Utc::now();
        if let Err(e) = self.storage.set(LAST_SYNC_KEY, &finished_at).await {
            tracing::error!("Синхронизация: не удалось сохранить отметку: {}", e);
        }

        {
            let mut state = self.state.write().await;
            match status {
                SyncStatus::Success | SyncStatus::Warning => state.last_success = Some(finished_at),
                SyncStatus::Error => state.last_error = Some(finished_at),
            }
        }

        let report = SyncReport {
            status,
            started_at,
            finished_at,
            platforms: results,
        };
        *self.last_report.write().await = Some(report.clone());

        self.event_log.log(
            "sync",
            &format!(
                "Синхронизация завершена: {:?}, платформ {}/{}",
                status,
                fulfilled,
                fulfilled + rejected
            ),
        );
        Ok(report)
    }

    /// Слить результаты платформ в общую коллекцию согласно политике
    async fn merge_fetched(&self, fetched: Vec<(Platform, Vec<Order>)>) {
        let mut orders = self.orders.write().await;
        for (platform, incoming) in fetched {
            merge_platform(&mut orders, platform, incoming, self.merge_policy);
        }
        orders.sort_by(|a, b| b.created_date.cmp(&a.created_date));
    }

    async fn persist_snapshot(&self) {
        let orders = self.orders.read().await.clone();
        if let Err(e) = self.storage.set(SNAPSHOT_KEY, &orders).await {
            tracing::error!("Синхронизация: не удалось сохранить снимок: {}", e);
        }
    }
}

/// Слияние свежей выборки одной платформы в коллекцию.
///
/// Политика применяется к подмножеству платформы: заказы других
/// платформ не трогаются никогда.
fn merge_platform(
    orders: &mut Vec<Order>,
    platform: Platform,
    incoming: Vec<Order>,
    policy: MergePolicy,
) {
    match policy {
        MergePolicy::Replace => {
            orders.retain(|o| o.platform != platform);
            orders.extend(incoming);
        }
        MergePolicy::Upsert => {
            for new_order in incoming {
                match orders
                    .iter_mut()
                    .find(|o| o.platform == platform && o.id == new_order.id)
                {
                    Some(existing) => *existing = new_order,
                    None => orders.push(new_order),
                }
            }
        }
        MergePolicy::Union => {
            for new_order in incoming {
                let exists = orders
                    .iter()
                    .any(|o| o.platform == platform && o.id == new_order.id);
                if !exists {
                    orders.push(new_order);
                }
            }
        }
    }
}
