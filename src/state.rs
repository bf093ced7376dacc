use std::sync::Arc;

use crate::cache::CacheStore;
use crate::fetch::PageFetcher;
use crate::preview::Previewer;

/// Shared application state passed to all handlers.
/// Cheap to clone; the cache pool and HTTP client are built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub previewer: Arc<Previewer>,
    pub cache: Arc<dyn CacheStore>,
}

impl AppState {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        fetcher: Arc<dyn PageFetcher>,
        max_body_bytes: u64,
    ) -> Self {
        AppState {
            previewer: Arc::new(Previewer::new(cache.clone(), fetcher, max_body_bytes)),
            cache,
        }
    }
}
