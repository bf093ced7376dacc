//! Cache-aside preview of a single URL.

use std::io::{BufReader, Read};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheStore};
use crate::extract::extract;
use crate::fetch::{BodyStream, FetchError, PageFetcher};
use crate::models::MetadataRecord;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Extraction task failed: {0}")]
    Extract(#[from] JoinError),
}

/// Looks a URL up in the cache and, on a miss, fetches and extracts it.
///
/// Concurrent misses for the same URL each fetch independently; the last
/// write to the cache wins.
pub struct Previewer {
    cache: Arc<dyn CacheStore>,
    fetcher: Arc<dyn PageFetcher>,
    max_body_bytes: u64,
}

impl Previewer {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        fetcher: Arc<dyn PageFetcher>,
        max_body_bytes: u64,
    ) -> Self {
        Previewer {
            cache,
            fetcher,
            max_body_bytes,
        }
    }

    /// Returns the metadata for `url`, from the cache when present.
    ///
    /// A failed fetch is returned as is and nothing is cached. A failed cache
    /// write after a successful extraction is logged and otherwise ignored.
    /// The cache connection is held for the whole call.
    pub async fn preview(&self, url: &str) -> Result<MetadataRecord, PreviewError> {
        let mut conn = self.cache.connect().await?;

        if let Some(record) = conn.get(url).await? {
            debug!(url = %url, "Preview cache hit");
            return Ok(record);
        }
        debug!(url = %url, "Preview cache miss, fetching page");

        let body = self.fetcher.fetch(url).await?;
        let record = self.extract_body(body).await?;

        if let Err(e) = conn.set(url, &record).await {
            warn!(error = %e, url = %url, "Failed to store preview in cache");
        }

        Ok(record)
    }

    /// Runs the extractor over `body` on a blocking thread, reading at most
    /// `max_body_bytes`.
    async fn extract_body(&self, body: BodyStream) -> Result<MetadataRecord, PreviewError> {
        let reader = SyncIoBridge::new(StreamReader::new(body));
        let limit = self.max_body_bytes;

        let record =
            tokio::task::spawn_blocking(move || extract(BufReader::new(reader.take(limit))))
                .await?;
        Ok(record)
    }
}
