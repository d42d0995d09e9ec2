//! cache_get tool implementation.
//!
//! Looks up the stored response for a request in one generation.

use haven_client::fetch::resolve;
use haven_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Request URL, absolute or relative to the origin.
    pub url: String,

    /// Request method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Generation to search (default: the running version's).
    #[serde(default)]
    pub generation: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(
    cache: &CacheDb, origin: &Url, current: &str, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let method = params.method.trim().to_ascii_uppercase();
    let name = params.generation.as_deref().unwrap_or(current);

    let entry = cache
        .generation(name)
        .match_request(&method, url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{method} {url} in {name}")))?;

    json_result(&CacheGetOutput {
        generation: name.to_string(),
        key_hash: entry.key_hash,
        method: entry.method,
        url: entry.url,
        status_code: entry.status_code,
        headers: entry.headers,
        body: String::from_utf8_lossy(&entry.body).into_owned(),
        body_bytes: entry.body.len(),
        stored_at: entry.stored_at,
    })
}
