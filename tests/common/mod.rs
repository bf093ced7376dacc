// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use unfurl_server::{
    app,
    cache::{CacheConnection, CacheError, CacheResult, CacheStore, MemoryStore},
    fetch::{BodyStream, FetchError, PageFetcher},
    models::MetadataRecord,
    state::AppState,
};

pub const BODY_LIMIT: u64 = 1 << 20;

/// Build the application router around the given cache and fetcher.
pub fn create_test_app(cache: Arc<dyn CacheStore>, fetcher: Arc<dyn PageFetcher>) -> Router {
    app::router(AppState::new(cache, fetcher, BODY_LIMIT))
}

// ── Fake fetcher ─────────────────────────────────────────────────────────────

/// Serves canned pages by exact URL and counts every fetch attempt.
/// Unknown URLs fail the way an unresolvable host would.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<BodyStream, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| FetchError::Resolve(format!("no such host for {url}")))?;
        let chunks: Vec<std::io::Result<Bytes>> = html
            .as_bytes()
            .chunks(16)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

// ── Faulty cache ─────────────────────────────────────────────────────────────

/// Wraps a [`MemoryStore`] and fails the selected operations.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_connect: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

#[async_trait]
impl CacheStore for FaultyStore {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>> {
        if self.fail_connect {
            return Err(CacheError::Unavailable("connection refused".into()));
        }
        Ok(Box::new(FaultyConnection {
            inner: self.inner.connect().await?,
            fail_reads: self.fail_reads,
            fail_writes: self.fail_writes,
        }))
    }
}

struct FaultyConnection {
    inner: Box<dyn CacheConnection>,
    fail_reads: bool,
    fail_writes: bool,
}

#[async_trait]
impl CacheConnection for FaultyConnection {
    async fn get(&mut self, url: &str) -> CacheResult<Option<MetadataRecord>> {
        if self.fail_reads {
            return Err(CacheError::Unavailable("read failed".into()));
        }
        self.inner.get(url).await
    }

    async fn set(&mut self, url: &str, record: &MetadataRecord) -> CacheResult<()> {
        if self.fail_writes {
            return Err(CacheError::Unavailable("write failed".into()));
        }
        self.inner.set(url, record).await
    }

    async fn ping(&mut self) -> CacheResult<()> {
        self.inner.ping().await
    }
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Percent-encode a URL for use as the `url` query parameter.
pub fn preview_uri(url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    format!("/?url={encoded}")
}
