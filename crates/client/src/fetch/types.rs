//! Request and response values passed between the host, the network and the cache.

use bytes::Bytes;
use haven_core::{CacheEntry, Error, cache::hash::compute_cache_key};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::url::without_fragment;

/// How a response relates to the document origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response; readable and cacheable.
    Basic,
    /// Cross-origin response with readable body.
    Cors,
    /// Cross-origin response whose body and status are hidden.
    Opaque,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
        }
    }
}

/// Outbound request issued by a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl Request {
    /// Request with no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new() }
    }

    /// Plain GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header, keeping any earlier value for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Key this request is stored under in a generation.
    pub fn cache_key(&self) -> String {
        compute_cache_key(self.method.as_str(), without_fragment(&self.url).as_str())
    }
}

/// Response delivered to the page, from the network or from a generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl Response {
    /// Same-origin response with no headers.
    pub fn basic(url: Url, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers: HeaderMap::new(), body: body.into(), kind: ResponseKind::Basic }
    }

    /// Whether this response may be written through to the cache:
    /// status 200 and neither cross-origin nor opaque.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.kind == ResponseKind::Basic
    }

    /// Content-Type header, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Capture this response as the cache entry for `request`.
    pub fn to_cache_entry(&self, request: &Request) -> CacheEntry {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        CacheEntry::new(
            request.method.as_str(),
            without_fragment(&request.url).as_str(),
            self.status.as_u16(),
            headers,
            self.body.to_vec(),
        )
    }

    /// Rebuild a response from a stored entry.
    ///
    /// Stored entries are always same-origin, so the kind is `Basic`.
    pub fn from_cache_entry(entry: CacheEntry) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status_code)
            .map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url)))?;

        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("{}: header {name}: {e}", entry.url)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::CorruptEntry(format!("{}: header {name}: {e}", entry.url)))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, headers, body: Bytes::from(entry.body), kind: ResponseKind::Basic })
    }
}
