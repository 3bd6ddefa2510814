use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;

/// Запись кэша: значение живо, пока `now < expires_at`
#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// Мемоизация с TTL по строковому ключу.
///
/// Просроченные записи вычищаются лениво при следующем чтении.
/// Дедупликации одновременных промахов нет: два конкурентных
/// `get_or_set` по отсутствующему ключу оба вызовут producer.
#[derive(Debug, Default)]
pub struct CacheManager {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Вернуть значение по ключу, если оно есть и не просрочено
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if Utc::now() < entry.expires_at => {
                serde_json::from_value(entry.value.clone()).ok()
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Положить значение с временем жизни `ttl`
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: std::time::Duration) {
        let json = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Cache: не удалось сериализовать значение для '{}': {}", key, e);
                return;
            }
        };
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: json,
                expires_at: Utc::now() + Duration::from_std(ttl).unwrap_or(Duration::zero()),
            },
        );
    }

    /// Вернуть кэшированное значение или вычислить его producer-ом.
    ///
    /// Producer вызывается только при промахе или просрочке; его
    /// результат кладётся в кэш с `expires_at = now + ttl`.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        ttl: std::time::Duration,
        producer: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = producer().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    #[cfg(test)]
    async fn force_expire(&self, key: &str) {
        if let Some(entry) = self.entries.lock().await.get_mut(key) {
            entry.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_second_read_within_ttl_does_not_invoke_producer() {
        let cache = CacheManager::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: i32 = cache
                .get_or_set("answer", StdDuration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_invokes_producer_again() {
        let cache = CacheManager::new();
        let calls = AtomicUsize::new(0);

        let produce = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("v".to_string())
        };

        let _: String = cache
            .get_or_set("k", StdDuration::from_secs(60), produce)
            .await
            .unwrap();
        cache.force_expire("k").await;
        let _: String = cache
            .get_or_set("k", StdDuration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("v2".to_string())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_purged_on_read() {
        let cache = CacheManager::new();
        cache.set("k", &1i32, StdDuration::from_secs(60)).await;
        cache.force_expire("k").await;

        assert_eq!(cache.get::<i32>("k").await, None);
        // запись удалена лениво, повторное чтение тоже пусто
        assert_eq!(cache.get::<i32>("k").await, None);
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let cache = CacheManager::new();
        let res: anyhow::Result<i32> = cache
            .get_or_set("k", StdDuration::from_secs(60), || async {
                anyhow::bail!("источник недоступен")
            })
            .await;
        assert!(res.is_err());

        let value: i32 = cache
            .get_or_set("k", StdDuration::from_secs(60), || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
