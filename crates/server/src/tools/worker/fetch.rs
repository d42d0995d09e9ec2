//! worker_fetch tool implementation.
//!
//! Dispatches a page request to the worker. Requests the worker does not
//! intercept are sent to the network exactly as given.

use std::collections::BTreeMap;

use haven_client::fetch::resolve;
use haven_client::{FetchOutcome, Fetcher, OfflineWorker, Request, Response, WorkerEvents};
use haven_core::Error;
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::json_result;

/// Input parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Target URL, absolute or relative to the origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// Final URL of the response.
    pub url: String,
    /// Where the response came from: network, cache, fallback or passthrough.
    pub source: String,
    pub status: u16,
    /// basic, cors or opaque.
    pub kind: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
}

impl WorkerFetchOutput {
    fn new(response: &Response, source: &str) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        Self {
            url: response.url.to_string(),
            source: source.to_string(),
            status: response.status.as_u16(),
            kind: response.kind.as_str().to_string(),
            content_type: response.content_type().map(str::to_string),
            headers,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_bytes: response.body.len(),
        }
    }
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(
    worker: &OfflineWorker, network: &dyn Fetcher, origin: &Url, params: WorkerFetchParams,
) -> Result<CallToolResult, McpError> {
    let request = build_request(origin, &params)?;

    let output = match worker.on_fetch(request).await? {
        FetchOutcome::Served(served) => WorkerFetchOutput::new(&served.response, served.source.as_str()),
        FetchOutcome::Passthrough(request) => {
            tracing::debug!(method = %request.method, url = %request.url, "forwarding passthrough request");
            let response = network.fetch(&request).await?;
            WorkerFetchOutput::new(&response, "passthrough")
        }
    };

    json_result(&output)
}

fn build_request(origin: &Url, params: &WorkerFetchParams) -> Result<Request, Error> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;

    let mut request = Request::new(method, url);
    for (name, value) in &params.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidInput(format!("invalid value for header {name}: {e}")))?;
        request = request.with_header(header, value);
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use crate::tools::worker::fixture;
    use haven_client::ClientRegistry;
    use haven_core::CacheDb;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(url: &str) -> WorkerFetchParams {
        WorkerFetchParams { url: url.to_string(), method: default_method(), headers: BTreeMap::new() }
    }

    #[test]
    fn test_build_request() {
        let origin = Url::parse("https://app.example.com").unwrap();
        let mut p = params("/css/main.css#top");
        p.method = "post".into();
        p.headers.insert("x-trace".into(), "abc".into());

        let request = build_request(&origin, &p).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "https://app.example.com/css/main.css");
        assert_eq!(request.headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        let origin = Url::parse("https://app.example.com").unwrap();

        assert!(matches!(build_request(&origin, &params("")), Err(Error::InvalidUrl(_))));
        assert!(matches!(build_request(&origin, &params("ftp://files.example.com/a")), Err(Error::InvalidUrl(_))));

        let mut p = params("/a.css");
        p.method = "BAD METHOD".into();
        assert!(matches!(build_request(&origin, &p), Err(Error::InvalidInput(_))));

        let mut p = params("/a.css");
        p.headers.insert("bad header".into(), "x".into());
        assert!(matches!(build_request(&origin, &p), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_impl_online_uses_network() {
        let server = fixture::origin().await;
        let config = fixture::config(&server, "v2");
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = fixture::worker(&config, &db, &ClientRegistry::new());
        let network = fixture::network(&config);
        let origin = Url::parse(&server.uri()).unwrap();
        worker.on_install().await.unwrap();

        let result = fetch_impl(&worker, network.as_ref(), &origin, params("/css/main.css"))
            .await
            .unwrap();
        let output: WorkerFetchOutput = parse_output(&result);

        assert_eq!(output.source, "network");
        assert_eq!(output.status, 200);
        assert_eq!(output.kind, "basic");
        assert_eq!(output.body, "body{}");
        assert_eq!(output.content_type.as_deref(), Some("text/css"));
    }

    #[tokio::test]
    async fn test_fetch_impl_offline_serves_cache_then_fallback() {
        let server = fixture::origin().await;
        let config = fixture::config(&server, "v2");
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = fixture::worker(&config, &db, &ClientRegistry::new());
        let network = fixture::network(&config);
        let origin = Url::parse(&server.uri()).unwrap();
        worker.on_install().await.unwrap();

        fixture::stall(&server).await;

        let cached: WorkerFetchOutput = parse_output(
            &fetch_impl(&worker, network.as_ref(), &origin, params("/css/main.css"))
                .await
                .unwrap(),
        );
        assert_eq!(cached.source, "cache");
        assert_eq!(cached.body, "body{}");

        let fallback: WorkerFetchOutput = parse_output(
            &fetch_impl(&worker, network.as_ref(), &origin, params("/unknown.json"))
                .await
                .unwrap(),
        );
        assert_eq!(fallback.source, "fallback");
        assert_eq!(fallback.body, "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_fetch_impl_before_install_is_passthrough() {
        let server = fixture::origin().await;
        let config = fixture::config(&server, "v2");
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = fixture::worker(&config, &db, &ClientRegistry::new());
        let network = fixture::network(&config);
        let origin = Url::parse(&server.uri()).unwrap();

        let output: WorkerFetchOutput = parse_output(
            &fetch_impl(&worker, network.as_ref(), &origin, params("/css/main.css"))
                .await
                .unwrap(),
        );
        assert_eq!(output.source, "passthrough");
        assert_eq!(output.body, "body{}");

        fixture::stall(&server).await;
        let err = fetch_impl(&worker, network.as_ref(), &origin, params("/css/main.css"))
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32004);
        assert!(db.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_impl_post_is_passthrough() {
        let server = fixture::origin().await;
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .and(header("x-form", "contact"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;
        let config = fixture::config(&server, "v2");
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = fixture::worker(&config, &db, &ClientRegistry::new());
        let network = fixture::network(&config);
        let origin = Url::parse(&server.uri()).unwrap();

        let mut p = params("/api/submit");
        p.method = "POST".into();
        p.headers.insert("x-form".into(), "contact".into());
        let output: WorkerFetchOutput = parse_output(&fetch_impl(&worker, network.as_ref(), &origin, p).await.unwrap());

        assert_eq!(output.source, "passthrough");
        assert_eq!(output.status, 201);
        assert_eq!(output.body, "created");
    }

    #[tokio::test]
    async fn test_fetch_impl_cross_origin_is_passthrough() {
        let server = fixture::origin().await;
        let cdn = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lib.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("lib()"))
            .mount(&cdn)
            .await;
        let config = fixture::config(&server, "v2");
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = fixture::worker(&config, &db, &ClientRegistry::new());
        let network = fixture::network(&config);
        let origin = Url::parse(&server.uri()).unwrap();
        worker.on_install().await.unwrap();

        let target = format!("{}/lib.js", cdn.uri());
        let output: WorkerFetchOutput =
            parse_output(&fetch_impl(&worker, network.as_ref(), &origin, params(&target)).await.unwrap());

        assert_eq!(output.source, "passthrough");
        assert_eq!(output.kind, "cors");
        assert_eq!(output.body, "lib()");

        worker.shutdown(std::time::Duration::from_secs(1)).await;
        let stored = db
            .generation("daemon-cache-v2")
            .match_request("GET", &target)
            .await
            .unwrap();
        assert!(stored.is_none());
    }
}
