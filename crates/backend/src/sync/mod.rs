pub mod manager;
pub mod worker;

pub use manager::SyncManager;
pub use worker::AutoSyncWorker;
