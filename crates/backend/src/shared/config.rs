use contracts::domain::sync::MergePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cdek: CdekConfig,
    #[serde(default)]
    pub megamarket: MegamarketConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Интервал автосинхронизации в секундах
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Политика слияния результатов платформы в общую коллекцию
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Глубина первой выборки, если watermark ещё не сохранён
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    /// Разрешить подстановку синтетических данных при недоступном API.
    /// При false неудачное чтение отдаётся наружу как офлайн-ошибка.
    #[serde(default = "default_true")]
    pub allow_synthetic: bool,
    /// Запускать ли фоновый цикл автосинхронизации
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            merge_policy: MergePolicy::default(),
            lookback_hours: default_lookback_hours(),
            allow_synthetic: true,
            auto_start: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Префикс пространства имён в key-value хранилище
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
    /// Обратимое base64-кодирование значений. Это не шифрование.
    #[serde(default)]
    pub obfuscate: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: default_storage_prefix(),
            obfuscate: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CdekConfig {
    #[serde(default = "default_cdek_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for CdekConfig {
    fn default() -> Self {
        Self {
            base_url: default_cdek_base_url(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MegamarketConfig {
    #[serde(default = "default_megamarket_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for MegamarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_megamarket_base_url(),
            token: String::new(),
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_sync_interval() -> u64 {
    600
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_storage_prefix() -> String {
    "texnoedem:".to_string()
}

fn default_cdek_base_url() -> String {
    "https://api.cdek.ru".to_string()
}

fn default_megamarket_base_url() -> String {
    "https://api.megamarket.tech".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 3000

[database]
path = "target/db/app.db"

[sync]
interval_secs = 600
merge_policy = "replace"
lookback_hours = 24
allow_synthetic = true
auto_start = true
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    // Try to find config.toml next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    // Fall back to default config
    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    // If absolute path, use as is
    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    // If relative path, resolve it relative to the executable directory
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let resolved_path = exe_dir.join(db_path);
            return Ok(resolved_path);
        }
    }

    // Fallback: use relative to current directory
    Ok(PathBuf::from(db_path_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config: Result<Config, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.database.path, "target/db/app.db");
        assert_eq!(config.sync.interval_secs, 600);
        assert_eq!(config.sync.merge_policy, MergePolicy::Replace);
        assert!(config.sync.allow_synthetic);
    }

    #[test]
    fn test_minimal_config_uses_section_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            path = "db/test.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.lookback_hours, 24);
        assert_eq!(config.storage.prefix, "texnoedem:");
        assert!(config.cdek.client_id.is_empty());
        assert_eq!(config.megamarket.timeout_secs, 30);
    }

    #[test]
    fn test_merge_policy_parses_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [database]
            path = "x.db"

            [sync]
            merge_policy = "upsert"
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.merge_policy, MergePolicy::Upsert);
    }
}
