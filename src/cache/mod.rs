//! Cache-aside storage for extracted metadata.
//!
//! [`CacheStore`] is the factory injected into the orchestrator; each preview
//! takes one [`CacheConnection`] from it and releases it by dropping it.
//!
//! Entries live under `<prefix><url>` and hold the JSON form of a
//! [`MetadataRecord`]. Every backend shares [`cache_key`], [`encode`] and
//! [`decode`] so they agree on the wire format.

mod memory;
mod redis_cache;

pub use memory::MemoryStore;
pub use redis_cache::RedisStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CacheBackend, CacheSettings};
use crate::models::MetadataRecord;

pub const DEFAULT_KEY_PREFIX: &str = "url_preview:";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Cache backend error: {0}")]
    Backend(#[from] deadpool_redis::redis::RedisError),

    #[error("Cache entry could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Hands out scoped connections to a key-value backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>>;
}

/// One borrowed backend connection. Dropping it returns it to its store.
#[async_trait]
pub trait CacheConnection: Send {
    /// `Ok(None)` when nothing is stored for `url`. A stored record whose
    /// fields are all empty is still `Ok(Some(_))`.
    async fn get(&mut self, url: &str) -> CacheResult<Option<MetadataRecord>>;

    /// Unconditionally overwrites the entry for `url`. Entries never expire.
    async fn set(&mut self, url: &str, record: &MetadataRecord) -> CacheResult<()>;

    async fn ping(&mut self) -> CacheResult<()>;
}

/// Builds the store selected by `settings`.
///
/// For Redis the backend is pinged once, so an unreachable server fails here
/// instead of on the first request.
pub async fn open_store(settings: &CacheSettings) -> CacheResult<Arc<dyn CacheStore>> {
    match settings.backend {
        CacheBackend::Redis => {
            let store = RedisStore::new(settings)?;
            store.connect().await?.ping().await?;
            Ok(Arc::new(store))
        }
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new(settings.key_prefix.as_str()))),
    }
}

pub fn cache_key(prefix: &str, url: &str) -> String {
    format!("{prefix}{url}")
}

pub fn encode(record: &MetadataRecord) -> CacheResult<String> {
    Ok(serde_json::to_string(record)?)
}

pub fn decode(raw: &str) -> CacheResult<MetadataRecord> {
    Ok(serde_json::from_str(raw)?)
}
