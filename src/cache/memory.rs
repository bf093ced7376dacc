use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    cache_key, decode, encode, CacheConnection, CacheError, CacheResult, CacheStore,
    DEFAULT_KEY_PREFIX,
};
use crate::models::MetadataRecord;

/// Process-local backend holding the same serialized entries Redis would.
///
/// Cheaply cloneable; all clones share one map.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    key_prefix: Arc<str>,
}

impl MemoryStore {
    pub fn new(key_prefix: &str) -> Self {
        MemoryStore {
            entries: Arc::new(Mutex::new(HashMap::new())),
            key_prefix: Arc::from(key_prefix),
        }
    }

    /// The serialized entry stored under the full (prefixed) `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> CacheResult<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(DEFAULT_KEY_PREFIX)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>> {
        Ok(Box::new(MemoryConnection {
            store: self.clone(),
        }))
    }
}

struct MemoryConnection {
    store: MemoryStore,
}

#[async_trait]
impl CacheConnection for MemoryConnection {
    async fn get(&mut self, url: &str) -> CacheResult<Option<MetadataRecord>> {
        let key = cache_key(&self.store.key_prefix, url);
        let raw = self.store.entries()?.get(&key).cloned();
        raw.as_deref().map(decode).transpose()
    }

    async fn set(&mut self, url: &str, record: &MetadataRecord) -> CacheResult<()> {
        let key = cache_key(&self.store.key_prefix, url);
        let raw = encode(record)?;
        self.store.entries()?.insert(key, raw);
        Ok(())
    }

    async fn ping(&mut self) -> CacheResult<()> {
        self.store.entries().map(|_| ())
    }
}
