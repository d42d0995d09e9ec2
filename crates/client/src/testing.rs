//! Scripted network and config helpers for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use haven_core::{Error, WorkerConfig};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use url::Url;

use crate::fetch::{Fetcher, Request, Response, ResponseKind, same_origin};

pub(crate) const ORIGIN: &str = "https://app.example.com";

/// Worker config for `ORIGIN` with the given version and manifest.
pub(crate) fn config(version: &str, assets: &[&str]) -> WorkerConfig {
    WorkerConfig {
        origin: ORIGIN.to_string(),
        cache_version: version.to_string(),
        static_assets: assets.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// In-process network with fixed routes that can be switched offline.
pub(crate) struct ScriptedNetwork {
    origin: Url,
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    online: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self {
            origin: Url::parse(ORIGIN).unwrap(),
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve `body` with `status` for `target` (a path or absolute URL).
    pub(crate) fn route(&self, target: &str, status: u16, body: &[u8]) -> &Self {
        let url = self.origin.join(target).unwrap();
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_vec()));
        self
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, body) = route.unwrap_or((404, b"not found".to_vec()));

        let mut response = Response::basic(request.url.clone(), StatusCode::from_u16(status).unwrap(), body);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        if !same_origin(&request.url, &self.origin) {
            response.kind = ResponseKind::Cors;
        }
        Ok(response)
    }
}
