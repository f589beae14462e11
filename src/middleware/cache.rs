//! Response cache keyed by request URI.
//!
//! ```rust,no_run
//! use pylon::middleware::ResponseCache;
//! use pylon::{App, HttpError, Request, Response};
//!
//! # async fn report(_req: Request) -> Result<Response, HttpError> { Ok(Response::text("")) }
//! let mut app = App::new();
//! app.wrap(ResponseCache::in_memory());
//! app.handle("GET /reports", report);
//! ```
//!
//! # What a hit replays
//!
//! Only the `Content-Type` header and the body are stored. A hit answers
//! `200 OK` with those two and nothing else: status codes and every other
//! header the handler set on the original miss are not reproduced. Put this
//! middleware only in front of endpoints whose responses are fully
//! described by their content type and body.
//!
//! The key is the path as the client sent it (group prefixes included) plus
//! the query; the method is not part of it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::config::Config;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::store::{FileStore, MemoryStore, Store};

/// Lifetime of a cached response unless configured otherwise.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// What the cache keeps of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub content_type: String,
    pub body: Bytes,
}

impl CachedResponse {
    fn capture(res: &Response) -> Self {
        Self {
            content_type: res.header("content-type").unwrap_or_default().to_owned(),
            body: res.body().clone(),
        }
    }

    fn replay(self) -> Response {
        Response::builder().bytes(&self.content_type, self.body)
    }
}

/// Middleware that serves repeated requests for the same URI from a store.
///
/// On a miss the downstream handler runs, its response is recorded, and the
/// response is passed on unchanged. On a hit the downstream handler is not
/// called at all, so nothing it would log or mutate happens.
///
/// Store faults never fail a request: a failing read is a miss and a failing
/// write is logged and ignored.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn Store<CachedResponse>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn Store<CachedResponse>>) -> Self {
        Self { store, ttl: DEFAULT_CACHE_TTL }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::<CachedResponse>::new()))
    }

    /// Durable variant. Entries on disk never expire on their own.
    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::<CachedResponse>::new(dir)))
    }

    /// On disk when `cache_dir` is set, in memory otherwise.
    pub fn from_config(config: &Config) -> Self {
        let cache = match &config.cache_dir {
            Some(dir) => Self::on_disk(dir.clone()),
            None => Self::in_memory(),
        };
        cache.with_ttl(config.cache_ttl)
    }

    /// Lifetime applied to every entry this cache writes. Zero never expires.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The backing store, for explicit invalidation.
    pub fn store(&self) -> &Arc<dyn Store<CachedResponse>> {
        &self.store
    }
}

impl Middleware for ResponseCache {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let store = Arc::clone(&self.store);
        let ttl = self.ttl;

        Box::pin(async move {
            let key = req.request_uri();

            if let Some(hit) = store.get(&key) {
                debug!(%key, "cache hit");
                return hit.replay();
            }

            let res = next.run(req).await;

            if let Err(e) = store.set(&key, CachedResponse::capture(&res), ttl) {
                warn!(%key, "response not cached: {e}");
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::StatusCode;

    use super::*;
    use crate::error::{HttpError, StoreError};
    use crate::handler::Handler;
    use crate::middleware::compose;

    fn get(uri: &str) -> Request {
        http::Request::get(uri).body(Bytes::new()).unwrap().into()
    }

    fn counting_endpoint(calls: Arc<AtomicUsize>) -> crate::handler::BoxedHandler {
        (move |req: Request| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, HttpError>(
                    Response::builder()
                        .status(StatusCode::CREATED)
                        .header("x-call", &n.to_string())
                        .json(format!(r#"{{"uri":"{}"}}"#, req.request_uri())),
                )
            }
        })
        .into_boxed_handler()
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn Middleware> = Arc::new(ResponseCache::in_memory());
        let app = compose(&[cache], counting_endpoint(Arc::clone(&calls)));

        let first = app.call(get("/x?y=1")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.status_code(), StatusCode::CREATED);
        assert_eq!(first.header("x-call"), Some("1"));

        let second = app.call(get("/x?y=1")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.body(), first.body());
        assert_eq!(second.header("content-type"), Some("application/json"));
        // Only content type and body survive a hit.
        assert_eq!(second.status_code(), StatusCode::OK);
        assert_eq!(second.header("x-call"), None);
    }

    #[tokio::test]
    async fn query_is_part_of_the_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn Middleware> = Arc::new(ResponseCache::in_memory());
        let app = compose(&[cache], counting_endpoint(Arc::clone(&calls)));

        app.call(get("/x?y=1")).await;
        app.call(get("/x?y=2")).await;
        app.call(get("/x")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn Middleware> =
            Arc::new(ResponseCache::in_memory().with_ttl(Duration::from_secs(30)));
        let app = compose(&[cache], counting_endpoint(Arc::clone(&calls)));

        app.call(get("/x")).await;
        tokio::time::advance(Duration::from_secs(31)).await;
        app.call(get("/x")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_invalidation_forces_a_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResponseCache::in_memory();
        let store = Arc::clone(cache.store());
        let app = compose(&[Arc::new(cache) as Arc<dyn Middleware>], counting_endpoint(Arc::clone(&calls)));

        app.call(get("/x")).await;
        store.delete("/x").unwrap();
        app.call(get("/x")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct BrokenStore;

    impl Store<CachedResponse> for BrokenStore {
        fn set(&self, _: &str, _: CachedResponse, _: Duration) -> Result<(), StoreError> {
            Err(std::io::Error::other("disk full").into())
        }
        fn get(&self, _: &str) -> Option<CachedResponse> { None }
        fn delete(&self, _: &str) -> Result<(), StoreError> { Ok(()) }
        fn clear(&self) -> Result<(), StoreError> { Ok(()) }
    }

    #[tokio::test]
    async fn store_faults_degrade_to_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn Middleware> = Arc::new(ResponseCache::new(Arc::new(BrokenStore)));
        let app = compose(&[cache], counting_endpoint(Arc::clone(&calls)));

        let res = app.call(get("/x")).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        app.call(get("/x")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disk_cache_serves_hits_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let first: Arc<dyn Middleware> = Arc::new(ResponseCache::on_disk(dir.path()));
        compose(&[first], counting_endpoint(Arc::clone(&calls))).call(get("/r?a=b")).await;

        let second: Arc<dyn Middleware> = Arc::new(ResponseCache::on_disk(dir.path()));
        let res = compose(&[second], counting_endpoint(Arc::clone(&calls))).call(get("/r?a=b")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(res.body().as_ref(), br#"{"uri":"/r?a=b"}"#);
    }
}
