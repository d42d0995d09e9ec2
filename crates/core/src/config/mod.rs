//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HAVEN_*)
//! 2. TOML config file (if HAVEN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::generation_name;

mod validation;

pub use validation::ConfigError;

/// Offline worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HAVEN_*)
/// 2. TOML config file (if HAVEN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin of the document this worker serves (scheme, host, port).
    ///
    /// Requests to any other origin are never intercepted.
    /// Set via HAVEN_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Fixed prefix of every generation name.
    ///
    /// Set via HAVEN_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Current version identifier. The generation named
    /// `<cache_prefix>-<cache_version>` is the only authoritative one.
    ///
    /// Set via HAVEN_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Document served when the network fails and the request is not cached.
    ///
    /// Set via HAVEN_OFFLINE_URL environment variable.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// URLs every new generation is populated with at install time.
    ///
    /// Set via HAVEN_STATIC_ASSETS environment variable (e.g. `[/a.css, /offline.html]`).
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Path extensions eligible for write-through caching.
    ///
    /// Set via HAVEN_CACHEABLE_EXTENSIONS environment variable (e.g. `[css, js]`).
    #[serde(default = "default_cacheable_extensions")]
    pub cacheable_extensions: Vec<String>,

    /// Activate right after install without waiting for open clients to close.
    ///
    /// Set via HAVEN_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Path to SQLite cache database.
    ///
    /// Set via HAVEN_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via HAVEN_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes read from the network.
    ///
    /// Set via HAVEN_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network timeout in milliseconds, applied by the fetcher.
    ///
    /// Set via HAVEN_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_prefix() -> String {
    "daemon-cache".into()
}

fn default_cache_version() -> String {
    "v2".into()
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_static_assets() -> Vec<String> {
    vec!["/css/main.css".into(), "/js/main.js".into(), "/offline.html".into()]
}

fn default_cacheable_extensions() -> Vec<String> {
    ["css", "js", "png", "jpg", "jpeg", "gif", "svg", "woff", "woff2", "ttf"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./haven-cache.sqlite")
}

fn default_user_agent() -> String {
    "haven/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            offline_url: default_offline_url(),
            static_assets: default_static_assets(),
            cacheable_extensions: default_cacheable_extensions(),
            skip_waiting_on_install: true,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the generation this configuration treats as current.
    pub fn generation_name(&self) -> String {
        generation_name(&self.cache_prefix, &self.cache_version)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve a manifest entry or path against the origin.
    ///
    /// Absolute URLs are kept as they are; the fragment is always dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or the path cannot be parsed.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        let mut url = self
            .origin_url()?
            .join(path.trim())
            .map_err(|e| ConfigError::Invalid { field: "url".into(), reason: format!("{path}: {e}") })?;
        url.set_fragment(None);
        Ok(url)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HAVEN_`
    /// 2. TOML file from `HAVEN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HAVEN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HAVEN_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.normalize_lists();

        config.validate()?;

        Ok(config)
    }

    /// Split comma-joined list entries and normalise extensions.
    fn normalize_lists(&mut self) {
        fn split(items: &[String]) -> Vec<String> {
            items
                .iter()
                .flat_map(|item| item.split(','))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }

        self.static_assets = split(&self.static_assets);
        self.cacheable_extensions = split(&self.cacheable_extensions)
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.origin, "http://localhost:8080");
        assert_eq!(config.cache_prefix, "daemon-cache");
        assert_eq!(config.cache_version, "v2");
        assert_eq!(config.offline_url, "/offline.html");
        assert_eq!(config.static_assets, vec!["/css/main.css", "/js/main.js", "/offline.html"]);
        assert_eq!(config.cacheable_extensions.len(), 10);
        assert!(config.skip_waiting_on_install);
        assert_eq!(config.db_path, PathBuf::from("./haven-cache.sqlite"));
        assert_eq!(config.user_agent, "haven/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_generation_name() {
        let config = WorkerConfig::default();
        assert_eq!(config.generation_name(), "daemon-cache-v2");

        let config = WorkerConfig { cache_version: "v3".into(), ..Default::default() };
        assert_eq!(config.generation_name(), "daemon-cache-v3");
    }

    #[test]
    fn test_timeout_duration() {
        let config = WorkerConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_resolve_relative_path() {
        let config = WorkerConfig::default();
        let url = config.resolve("/css/main.css#top").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/css/main.css");
    }

    #[test]
    fn test_resolve_keeps_absolute_url() {
        let config = WorkerConfig::default();
        let url = config.resolve("https://cdn.example.com/a.js").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a.js");
    }

    #[test]
    fn test_normalize_lists_splits_env_values() {
        let mut config = WorkerConfig {
            static_assets: vec!["/a.css, /b.js,/offline.html".into()],
            cacheable_extensions: vec![".CSS,js".into()],
            ..Default::default()
        };
        config.normalize_lists();
        assert_eq!(config.static_assets, vec!["/a.css", "/b.js", "/offline.html"]);
        assert_eq!(config.cacheable_extensions, vec!["css", "js"]);
    }
}
