pub mod cache;
pub mod config;
pub mod data;
pub mod format;
pub mod logger;
pub mod storage;
