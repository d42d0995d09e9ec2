//! Per-request network-first policy.
//!
//! Only same-origin GET requests are intercepted. For those:
//! 1. Try the network and return its response unchanged.
//! 2. If the response is a cacheable static asset, copy it into the current
//!    generation in a detached task.
//! 3. If the network fails: exact cache hit, then the offline document,
//!    then the failure itself.

pub mod extensions;

use std::sync::Arc;
use std::time::Duration;

use haven_core::{CacheDb, Error, Generation, WorkerConfig};
use reqwest::Method;
use tokio_util::task::TaskTracker;
use url::Url;

pub use extensions::CacheableExtensions;

use crate::fetch::{Fetcher, Request, Response, same_origin};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Response produced by the interceptor.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

/// Decision for one request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host sends the request as it is.
    Passthrough(Request),
    Served(Served),
}

/// Network-first interceptor bound to one generation.
pub struct FetchInterceptor {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
    generation: String,
    offline_url: Url,
    extensions: CacheableExtensions,
    writes: TaskTracker,
}

impl FetchInterceptor {
    /// Create an interceptor for the generation named in `config`.
    pub fn new(config: &WorkerConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let offline_url = config
            .resolve(&config.offline_url)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let extensions = CacheableExtensions::new(&config.cacheable_extensions)?;

        Ok(Self {
            db,
            fetcher,
            origin,
            generation: config.generation_name(),
            offline_url,
            extensions,
            writes: TaskTracker::new(),
        })
    }

    pub fn generation_name(&self) -> &str {
        &self.generation
    }

    pub fn offline_url(&self) -> &Url {
        &self.offline_url
    }

    /// Whether `request` goes through the network-first policy.
    pub fn intercepts(&self, request: &Request) -> bool {
        request.method == Method::GET && same_origin(&request.url, &self.origin)
    }

    /// Apply the policy to one request.
    ///
    /// # Errors
    ///
    /// `OFFLINE_FALLBACK_MISSING` when the network fails and neither the
    /// request nor the offline document is cached.
    pub async fn handle(&self, request: Request) -> Result<FetchOutcome, Error> {
        if !self.intercepts(&request) {
            tracing::debug!("passthrough {} {}", request.method, request.url);
            return Ok(FetchOutcome::Passthrough(request));
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() && self.extensions.matches(&request.url) {
                    self.write_through(&request, &response);
                }
                Ok(FetchOutcome::Served(Served { response, source: ResponseSource::Network }))
            }
            Err(cause) => {
                tracing::debug!(url = %request.url, error = %cause, "network failed, falling back to cache");
                self.fallback(&request, cause).await.map(FetchOutcome::Served)
            }
        }
    }

    fn write_through(&self, request: &Request, response: &Response) {
        let entry = response.to_cache_entry(request);
        let generation = self.db.generation(&self.generation);
        self.writes.spawn(async move {
            match generation.put(&entry).await {
                Ok(()) => tracing::debug!(generation = %generation.name(), url = %entry.url, "cached"),
                Err(e) => tracing::warn!(generation = %generation.name(), url = %entry.url, error = %e, "cache write failed"),
            }
        });
    }

    async fn fallback(&self, request: &Request, cause: Error) -> Result<Served, Error> {
        let generation = self.db.generation(&self.generation);

        if let Some(response) = lookup(&generation, &request.cache_key()).await {
            return Ok(Served { response, source: ResponseSource::Cache });
        }

        let offline = Request::get(self.offline_url.clone());
        if let Some(response) = lookup(&generation, &offline.cache_key()).await {
            tracing::debug!(url = %request.url, "serving offline document");
            return Ok(Served { response, source: ResponseSource::Fallback });
        }

        tracing::warn!(url = %request.url, offline_url = %self.offline_url, "offline document missing from cache");
        Err(Error::FallbackMissing(format!(
            "{} not cached in {} ({cause})",
            self.offline_url, self.generation
        )))
    }

    /// Number of write-through tasks still running.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Wait for every write-through task spawned so far.
    pub async fn flush_writes(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// Wait at most `grace` for pending writes; the rest are abandoned.
    pub async fn shutdown(&self, grace: Duration) {
        self.writes.close();
        if tokio::time::timeout(grace, self.writes.wait()).await.is_err() {
            tracing::warn!(pending = self.writes.len(), "abandoning pending cache writes");
        }
    }
}

/// Cached response for `key`, treating store and decode errors as misses.
async fn lookup(generation: &Generation, key: &str) -> Option<Response> {
    match generation.get(key).await {
        Ok(Some(entry)) => match Response::from_cache_entry(entry) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(generation = %generation.name(), error = %e, "skipping unreadable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(generation = %generation.name(), error = %e, "cache lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{ClientRegistry, LifecycleController};
    use crate::testing::{ScriptedNetwork, config, url};
    use bytes::Bytes;
    use reqwest::StatusCode;

    const MANIFEST: &[&str] = &["/a.css", "/b.js", "/offline.html"];

    struct Fixture {
        db: CacheDb,
        net: Arc<ScriptedNetwork>,
        interceptor: FetchInterceptor,
    }

    async fn fixture(installed: bool) -> Fixture {
        let db = CacheDb::open_in_memory().await.unwrap();
        let net = Arc::new(ScriptedNetwork::new());
        net.route("/a.css", 200, b"a{color:red}")
            .route("/b.js", 200, b"b()")
            .route("/offline.html", 200, b"<h1>offline</h1>");

        let config = config("v2", MANIFEST);
        let fetcher: Arc<dyn Fetcher> = net.clone();
        if installed {
            let lifecycle =
                LifecycleController::new(&config, db.clone(), fetcher.clone(), ClientRegistry::new()).unwrap();
            lifecycle.install().await.unwrap();
            lifecycle.activate().await.unwrap();
        } else {
            db.open_generation(&config.generation_name()).await.unwrap();
        }

        let interceptor = FetchInterceptor::new(&config, db.clone(), fetcher).unwrap();
        Fixture { db, net, interceptor }
    }

    fn served(outcome: FetchOutcome) -> Served {
        match outcome {
            FetchOutcome::Served(served) => served,
            FetchOutcome::Passthrough(req) => panic!("expected interception of {}", req.url),
        }
    }

    #[tokio::test]
    async fn test_network_response_returned_unchanged() {
        let fx = fixture(true).await;
        fx.net.route("/page.html", 200, b"<p>fresh</p>");

        let out = served(fx.interceptor.handle(Request::get(url("/page.html"))).await.unwrap());

        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.status, StatusCode::OK);
        assert_eq!(out.response.body, Bytes::from_static(b"<p>fresh</p>"));
    }

    #[tokio::test]
    async fn test_network_first_even_when_cached() {
        let fx = fixture(true).await;
        fx.net.route("/a.css", 200, b"a{color:blue}");

        let out = served(fx.interceptor.handle(Request::get(url("/a.css"))).await.unwrap());

        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.body, Bytes::from_static(b"a{color:blue}"));
    }

    #[tokio::test]
    async fn test_non_get_passthrough() {
        let fx = fixture(true).await;
        let request = Request::new(Method::POST, url("/api/items"));

        let outcome = fx.interceptor.handle(request.clone()).await.unwrap();

        assert!(matches!(outcome, FetchOutcome::Passthrough(ref r) if *r == request));
        assert_eq!(fx.net.calls(), 3, "only install fetches reach the network");
    }

    #[tokio::test]
    async fn test_cross_origin_passthrough() {
        let fx = fixture(true).await;
        let request = Request::get(Url::parse("https://cdn.example.com/lib.js").unwrap());

        let outcome = fx.interceptor.handle(request.clone()).await.unwrap();

        assert!(matches!(outcome, FetchOutcome::Passthrough(ref r) if *r == request));
        assert_eq!(fx.net.calls(), 3);
    }

    #[tokio::test]
    async fn test_write_through_round_trip() {
        let fx = fixture(true).await;
        let body: &[u8] = &[0x89, b'P', b'N', b'G', 0, 1, 2, 255];
        fx.net.route("/img/logo.png", 200, body);
        let request = Request::get(url("/img/logo.png"));

        let live = served(fx.interceptor.handle(request.clone()).await.unwrap());
        fx.interceptor.flush_writes().await;

        let entry = fx
            .db
            .generation("daemon-cache-v2")
            .get(&request.cache_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.body, body);
        let cached = Response::from_cache_entry(entry).unwrap();
        assert_eq!(cached.body, live.response.body);
        assert_eq!(cached.status, live.response.status);

        fx.net.set_online(false);
        let offline = served(fx.interceptor.handle(request).await.unwrap());
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.body, Bytes::from_static(body));
    }

    #[tokio::test]
    async fn test_error_status_not_cached() {
        let fx = fixture(true).await;
        fx.net.route("/image.png", 404, b"missing");
        let request = Request::get(url("/image.png"));

        let out = served(fx.interceptor.handle(request.clone()).await.unwrap());
        fx.interceptor.flush_writes().await;

        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.status, StatusCode::NOT_FOUND);
        assert_eq!(out.response.body, Bytes::from_static(b"missing"));
        let entry = fx
            .db
            .generation("daemon-cache-v2")
            .get(&request.cache_key())
            .await
            .unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_non_static_extension_not_cached() {
        let fx = fixture(true).await;
        fx.net.route("/api/data.json", 200, b"{}");
        let request = Request::get(url("/api/data.json"));

        fx.interceptor.handle(request.clone()).await.unwrap();
        fx.interceptor.flush_writes().await;

        let entry = fx
            .db
            .generation("daemon-cache-v2")
            .get(&request.cache_key())
            .await
            .unwrap();
        assert!(entry.is_none());
        assert_eq!(fx.interceptor.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_offline_serves_exact_cache_hit() {
        let fx = fixture(true).await;
        fx.net.set_online(false);

        let out = served(fx.interceptor.handle(Request::get(url("/a.css"))).await.unwrap());

        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.body, Bytes::from_static(b"a{color:red}"));
    }

    #[tokio::test]
    async fn test_offline_miss_serves_offline_document() {
        let fx = fixture(true).await;
        fx.net.set_online(false);

        let out = served(fx.interceptor.handle(Request::get(url("/unknown.json"))).await.unwrap());

        assert_eq!(out.source, ResponseSource::Fallback);
        assert_eq!(out.response.body, Bytes::from_static(b"<h1>offline</h1>"));
    }

    #[tokio::test]
    async fn test_offline_without_fallback_fails() {
        let fx = fixture(false).await;
        fx.net.set_online(false);

        let result = fx.interceptor.handle(Request::get(url("/unknown.json"))).await;

        assert!(matches!(result, Err(Error::FallbackMissing(msg)) if msg.contains("offline")));
    }

    #[tokio::test]
    async fn test_write_into_missing_generation_is_swallowed() {
        let fx = fixture(true).await;
        fx.db.delete_generation("daemon-cache-v2").await.unwrap();
        fx.net.route("/c.css", 200, b"c{}");

        let out = served(fx.interceptor.handle(Request::get(url("/c.css"))).await.unwrap());
        fx.interceptor.flush_writes().await;

        assert_eq!(out.source, ResponseSource::Network);
        assert!(fx.db.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_writes() {
        let fx = fixture(true).await;
        fx.net.route("/d.js", 200, b"d()");
        let request = Request::get(url("/d.js"));

        fx.interceptor.handle(request.clone()).await.unwrap();
        fx.interceptor.shutdown(Duration::from_secs(5)).await;

        let entry = fx
            .db
            .generation("daemon-cache-v2")
            .get(&request.cache_key())
            .await
            .unwrap();
        assert!(entry.is_some());
    }
}
