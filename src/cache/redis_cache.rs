use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use tracing::info;

use super::{cache_key, decode, encode, CacheConnection, CacheError, CacheResult, CacheStore};
use crate::config::CacheSettings;
use crate::models::MetadataRecord;

/// Redis backend over a `deadpool-redis` pool.
///
/// The pool opens at most `max_active` connections and keeps at most
/// `max_idle` of them around once they are returned.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    key_prefix: Arc<str>,
    max_idle: usize,
}

impl RedisStore {
    /// Creates the pool. No connection is opened until the first `connect`.
    pub fn new(settings: &CacheSettings) -> CacheResult<Self> {
        info!("🔌 Connecting to Redis at {}...", settings.redis_url);

        let mut config = Config::from_url(settings.redis_url.clone());
        config.pool = Some(PoolConfig::new(settings.max_active));
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(RedisStore {
            pool,
            key_prefix: Arc::from(settings.key_prefix.as_str()),
            max_idle: settings.max_idle,
        })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>> {
        let conn = self.pool.get().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to get a Redis connection");
            CacheError::from(e)
        })?;

        Ok(Box::new(RedisConnection {
            conn,
            key_prefix: self.key_prefix.clone(),
            _trim: IdleTrim {
                pool: self.pool.clone(),
                max_idle: self.max_idle,
            },
        }))
    }
}

// Fields drop in declaration order, so `conn` is back in the pool before
// `_trim` runs.
struct RedisConnection {
    conn: Connection,
    key_prefix: Arc<str>,
    _trim: IdleTrim,
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn get(&mut self, url: &str) -> CacheResult<Option<MetadataRecord>> {
        let key = cache_key(&self.key_prefix, url);
        let raw: Option<String> = self.conn.get(&key).await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn set(&mut self, url: &str, record: &MetadataRecord) -> CacheResult<()> {
        let key = cache_key(&self.key_prefix, url);
        let raw = encode(record)?;
        self.conn.set::<_, _, ()>(&key, raw).await?;
        Ok(())
    }

    async fn ping(&mut self) -> CacheResult<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }
}

/// Closes idle connections beyond `max_idle` when dropped.
struct IdleTrim {
    pool: Pool,
    max_idle: usize,
}

impl Drop for IdleTrim {
    fn drop(&mut self) {
        let kept = AtomicUsize::new(0);
        let _ = self
            .pool
            .retain(|_, _| kept.fetch_add(1, Ordering::Relaxed) < self.max_idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CacheSettings {
        CacheSettings {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            key_prefix: "url_preview_test:".into(),
            ..CacheSettings::default()
        }
    }

    #[test]
    fn pool_creation_does_not_connect() {
        let store = RedisStore::new(&CacheSettings {
            redis_url: "redis://127.0.0.1:1".into(),
            ..CacheSettings::default()
        })
        .unwrap();
        assert_eq!(store.pool.status().max_size, 12_000);
    }

    #[test]
    fn invalid_url_is_unavailable() {
        let result = RedisStore::new(&CacheSettings {
            redis_url: "not a redis url".into(),
            ..CacheSettings::default()
        });
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server (set REDIS_URL)"]
    async fn round_trips_through_redis() {
        let store = RedisStore::new(&settings()).unwrap();
        let record = MetadataRecord {
            title: "Redis".into(),
            icon: "/r.ico".into(),
            ..Default::default()
        };
        let url = "http://redis-round-trip.example";

        let mut conn = store.connect().await.unwrap();
        conn.ping().await.unwrap();
        conn.set(url, &record).await.unwrap();
        assert_eq!(conn.get(url).await.unwrap(), Some(record));
        assert_eq!(conn.get("http://never-stored.example").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server (set REDIS_URL)"]
    async fn idle_connections_are_capped() {
        let store = RedisStore::new(&CacheSettings {
            max_idle: 2,
            ..settings()
        })
        .unwrap();

        let mut held = Vec::new();
        for _ in 0..5 {
            held.push(store.connect().await.unwrap());
        }
        drop(held);

        assert!(store.pool.status().available <= 2);
    }
}
