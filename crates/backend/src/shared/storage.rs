use anyhow::Result;
use base64::Engine;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Модель строки key-value хранилища
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_storage")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Снимок всех ключей пространства имён для backup/restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBackup {
    pub version: u32,
    pub created_at: chrono::DateTime<Utc>,
    pub data: BTreeMap<String, serde_json::Value>,
}

/// Key-value хранилище с префиксом пространства имён.
///
/// Значения сериализуются в JSON; опционально применяется обратимое
/// base64-кодирование. Это осознанно не шифрование, а защита от
/// случайного чтения глазами.
#[derive(Debug, Clone)]
pub struct StorageAdapter {
    conn: DatabaseConnection,
    prefix: String,
    obfuscate: bool,
}

impl StorageAdapter {
    pub fn new(conn: DatabaseConnection, prefix: impl Into<String>, obfuscate: bool) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            obfuscate,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn encode(&self, json: &str) -> String {
        if self.obfuscate {
            base64::engine::general_purpose::STANDARD.encode(json)
        } else {
            json.to_string()
        }
    }

    fn decode(&self, stored: &str) -> Option<serde_json::Value> {
        let json = if self.obfuscate {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(stored)
                .ok()?;
            String::from_utf8(bytes).ok()?
        } else {
            stored.to_string()
        };
        serde_json::from_str(&json).ok()
    }

    /// Записать значение под ключом (upsert)
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let active = ActiveModel {
            key: Set(self.full_key(key)),
            value: Set(self.encode(&json)),
            updated_at: Set(Utc::now().to_rfc3339()),
        };
        Entity::insert(active)
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_columns([Column::Value, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Прочитать значение. Повреждённая запись удаляется и считается
    /// отсутствующей, а не ошибкой.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.full_key(key);
        let row = Entity::find_by_id(full_key.clone()).one(&self.conn).await?;
        let Some(row) = row else {
            return Ok(None);
        };
        match self.decode(&row.value).and_then(|v| serde_json::from_value(v).ok()) {
            Some(value) => Ok(Some(value)),
            None => {
                tracing::warn!("Storage: повреждённая запись '{}' удалена", full_key);
                Entity::delete_by_id(full_key).exec(&self.conn).await?;
                Ok(None)
            }
        }
    }

    /// Прочитать значение или вернуть default
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        Entity::delete_by_id(self.full_key(key))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Удалить только ключи своего пространства имён
    pub async fn clear(&self) -> Result<()> {
        Entity::delete_many()
            .filter(Column::Key.starts_with(&self.prefix))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Снять снимок всех ключей пространства имён
    pub async fn backup(&self) -> Result<StorageBackup> {
        let rows = Entity::find()
            .filter(Column::Key.starts_with(&self.prefix))
            .all(&self.conn)
            .await?;

        let mut data = BTreeMap::new();
        for row in rows {
            let Some(value) = self.decode(&row.value) else {
                tracing::warn!("Storage: запись '{}' пропущена в backup (повреждена)", row.key);
                continue;
            };
            let short_key = row.key.trim_start_matches(&self.prefix).to_string();
            data.insert(short_key, value);
        }

        Ok(StorageBackup {
            version: 1,
            created_at: Utc::now(),
            data,
        })
    }

    /// Восстановить пространство имён из снимка.
    ///
    /// Снимок валидируется целиком до записи, очистка и вставка идут
    /// в одной транзакции: неудачный restore не теряет старые данные.
    pub async fn restore(&self, backup: &StorageBackup) -> Result<usize> {
        if backup.version != 1 {
            anyhow::bail!("Неподдерживаемая версия снимка: {}", backup.version);
        }

        let now = Utc::now().to_rfc3339();
        let mut rows = Vec::with_capacity(backup.data.len());
        for (key, value) in &backup.data {
            if key.trim().is_empty() {
                anyhow::bail!("Снимок содержит пустой ключ");
            }
            let json = serde_json::to_string(value)?;
            rows.push(ActiveModel {
                key: Set(self.full_key(key)),
                value: Set(self.encode(&json)),
                updated_at: Set(now.clone()),
            });
        }

        let restored = rows.len();
        let prefix = self.prefix.clone();
        self.conn
            .transaction::<_, (), DbErr>(|txn| {
                Box::pin(async move {
                    Entity::delete_many()
                        .filter(Column::Key.starts_with(&prefix))
                        .exec(txn)
                        .await?;
                    for row in rows {
                        Entity::insert(row).exec(txn).await?;
                    }
                    Ok(())
                })
            })
            .await?;

        tracing::info!("Storage: восстановлено {} ключей", restored);
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::db;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: i32,
    }

    async fn adapter(prefix: &str, obfuscate: bool) -> StorageAdapter {
        let conn = db::connect_in_memory().await.unwrap();
        db::ensure_schema(&conn).await.unwrap();
        StorageAdapter::new(conn, prefix, obfuscate)
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let storage = adapter("t:", false).await;
        let sample = Sample {
            name: "Заказ".to_string(),
            count: 7,
        };
        storage.set("sample", &sample).await.unwrap();
        let loaded: Sample = storage.get("sample").await.unwrap().unwrap();
        assert_eq!(loaded, sample);
    }

    #[tokio::test]
    async fn test_obfuscated_round_trip() {
        let storage = adapter("t:", true).await;
        storage.set("n", &123i64).await.unwrap();
        let loaded: i64 = storage.get("n").await.unwrap().unwrap();
        assert_eq!(loaded, 123);
    }

    #[tokio::test]
    async fn test_remove_then_get_returns_default() {
        let storage = adapter("t:", false).await;
        storage.set("k", &1i32).await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get::<i32>("k").await.unwrap(), None);
        assert_eq!(storage.get_or("k", 99i32).await.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_prefix() {
        let conn = db::connect_in_memory().await.unwrap();
        db::ensure_schema(&conn).await.unwrap();
        let ours = StorageAdapter::new(conn.clone(), "app:", false);
        let foreign = StorageAdapter::new(conn, "other:", false);

        ours.set("a", &1i32).await.unwrap();
        foreign.set("b", &2i32).await.unwrap();

        ours.clear().await.unwrap();

        assert_eq!(ours.get::<i32>("a").await.unwrap(), None);
        assert_eq!(foreign.get::<i32>("b").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_backup_restore_round_trip() {
        let storage = adapter("t:", false).await;
        storage.set("one", &1i32).await.unwrap();
        storage
            .set("two", &Sample { name: "x".into(), count: 2 })
            .await
            .unwrap();

        let backup = storage.backup().await.unwrap();
        assert_eq!(backup.data.len(), 2);

        storage.set("three", &3i32).await.unwrap();
        let restored = storage.restore(&backup).await.unwrap();
        assert_eq!(restored, 2);

        // ключ, которого не было в снимке, исчез
        assert_eq!(storage.get::<i32>("three").await.unwrap(), None);
        assert_eq!(storage.get::<i32>("one").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_existing_data() {
        let storage = adapter("t:", false).await;
        storage.set("keep", &42i32).await.unwrap();

        let bad = StorageBackup {
            version: 99,
            created_at: Utc::now(),
            data: BTreeMap::new(),
        };
        assert!(storage.restore(&bad).await.is_err());
        assert_eq!(storage.get::<i32>("keep").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_discarded() {
        let storage = adapter("t:", false).await;
        // пишем заведомо не-JSON напрямую в таблицу
        let active = ActiveModel {
            key: Set("t:bad".to_string()),
            value: Set("{не json".to_string()),
            updated_at: Set(Utc::now().to_rfc3339()),
        };
        Entity::insert(active).exec(&storage.conn).await.unwrap();

        assert_eq!(storage.get::<i32>("bad").await.unwrap(), None);
    }
}
