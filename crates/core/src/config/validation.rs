//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_prefix` or `cache_version` is empty
    /// - `origin` is not an http(s) URL with a host
    /// - a `static_assets` entry does not resolve to the origin
    /// - `offline_url` is not part of `static_assets`
    /// - `cacheable_extensions` is empty or holds a non-alphanumeric entry
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `static_assets` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("must be an http(s) URL with a host, got {}", self.origin),
            });
        }

        if self.static_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_assets".into(),
                hint: "list at least the offline document".into(),
            });
        }

        let mut manifest = Vec::with_capacity(self.static_assets.len());
        for asset in &self.static_assets {
            let url = self.resolve(asset)?;
            if url.origin() != origin.origin() {
                return Err(ConfigError::Invalid {
                    field: "static_assets".into(),
                    reason: format!("{asset} is not same-origin with {}", self.origin),
                });
            }
            manifest.push(url);
        }

        let offline = self.resolve(&self.offline_url)?;
        if !manifest.contains(&offline) {
            return Err(ConfigError::Invalid {
                field: "offline_url".into(),
                reason: format!("{} must be listed in static_assets", self.offline_url),
            });
        }

        if self.cacheable_extensions.is_empty() {
            return Err(ConfigError::Invalid {
                field: "cacheable_extensions".into(),
                reason: "must list at least one extension".into(),
            });
        }
        if let Some(bad) = self
            .cacheable_extensions
            .iter()
            .find(|ext| ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(ConfigError::Invalid {
                field: "cacheable_extensions".into(),
                reason: format!("'{bad}' is not a plain extension"),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.skip_waiting_on_install {
            tracing::debug!("skip_waiting_on_install disabled; installed generations wait for open clients to close");
        }

        Ok(())
    }
}
