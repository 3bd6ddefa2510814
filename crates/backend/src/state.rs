use std::sync::Arc;

use crate::platforms::cdek::CdekClient;
use crate::platforms::megamarket::MegamarketClient;
use crate::platforms::PlatformClient;
use crate::shared::cache::CacheManager;
use crate::shared::config::Config;
use crate::shared::logger::EventLog;
use crate::shared::storage::StorageAdapter;
use crate::sync::{AutoSyncWorker, SyncManager};
use sea_orm::DatabaseConnection;

/// Единая точка сборки приложения.
///
/// Все зависимости создаются здесь один раз и раздаются хендлерам
/// через axum State; глобальных синглтонов нет.
pub struct AppState {
    pub config: Config,
    pub storage: Arc<StorageAdapter>,
    pub cache: Arc<CacheManager>,
    pub event_log: EventLog,
    pub cdek: Arc<CdekClient>,
    pub megamarket: Arc<MegamarketClient>,
    pub sync: Arc<SyncManager>,
    pub worker: Arc<AutoSyncWorker>,
}

impl AppState {
    pub fn build(config: Config, conn: DatabaseConnection) -> Arc<Self> {
        let storage = Arc::new(StorageAdapter::new(
            conn.clone(),
            config.storage.prefix.clone(),
            config.storage.obfuscate,
        ));
        let cache = Arc::new(CacheManager::new());
        let event_log = EventLog::new(conn);

        let allow_synthetic = config.sync.allow_synthetic;
        let cdek = Arc::new(CdekClient::new(
            config.cdek.clone(),
            allow_synthetic,
            Arc::clone(&cache),
        ));
        let megamarket = Arc::new(MegamarketClient::new(
            config.megamarket.clone(),
            allow_synthetic,
        ));

        let platforms: Vec<Arc<dyn PlatformClient>> = vec![
            Arc::clone(&cdek) as Arc<dyn PlatformClient>,
            Arc::clone(&megamarket) as Arc<dyn PlatformClient>,
        ];
        let sync = Arc::new(SyncManager::new(
            platforms,
            Arc::clone(&storage),
            event_log.clone(),
            config.sync.merge_policy,
            config.sync.lookback_hours,
        ));
        let worker = Arc::new(AutoSyncWorker::new(
            Arc::clone(&sync),
            config.sync.interval_secs,
        ));

        Arc::new(Self {
            config,
            storage,
            cache,
            event_log,
            cdek,
            megamarket,
            sync,
            worker,
        })
    }

    /// Клиент платформы по её идентификатору
    pub fn platform_client(
        &self,
        platform: contracts::domain::order::Platform,
    ) -> Arc<dyn PlatformClient> {
        match platform {
            contracts::domain::order::Platform::Cdek => {
                Arc::clone(&self.cdek) as Arc<dyn PlatformClient>
            }
            contracts::domain::order::Platform::Megamarket => {
                Arc::clone(&self.megamarket) as Arc<dyn PlatformClient>
            }
        }
    }
}
