//! Network access for the worker.
//!
//! ### Fetcher
//! The interceptor and the lifecycle controller only see the [`Fetcher`]
//! trait, so hosts can plug in their own network and tests can script one.
//!
//! ### FetchClient
//! - reqwest-backed [`Fetcher`]
//! - Non-2xx statuses are responses, not errors
//! - Timeouts, connection failures and oversize bodies are errors
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod types;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::{Duration, Instant};

pub use types::{Request, Response, ResponseKind};
pub use self::url::{UrlError, resolve, same_origin};

use haven_core::{Error, WorkerConfig};

/// Source of network responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue `request` over the network.
    ///
    /// Any HTTP status is a successful fetch; only transport failures
    /// (see [`Error::is_network_failure`]) are errors.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Document origin; responses from it are `basic`, others `cors`.
    pub origin: ::url::Url,

    /// User agent string (default: "haven/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            origin: ::url::Url::parse("http://localhost:8080").expect("static origin parses"),
            user_agent: "haven/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Fetch settings derived from the worker configuration.
    pub fn from_worker(config: &WorkerConfig) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        })
    }
}

/// reqwest-backed network fetcher.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn kind_of(&self, final_url: &::url::Url) -> ResponseKind {
        if same_origin(final_url, &self.config.origin) { ResponseKind::Basic } else { ResponseKind::Cors }
    }
}

fn transport_error(url: &::url::Url, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| transport_error(&request.url, &e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{}: {} bytes exceeds {}",
                request.url, len, self.config.max_bytes
            )));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&request.url, &e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{}: {} bytes exceeds {}",
                request.url,
                body.len(),
                self.config.max_bytes
            )));
        }

        let kind = self.kind_of(&final_url);

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { url: final_url, status, headers, body, kind })
    }
}
