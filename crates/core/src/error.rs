//! Unified error types for haven.
//!
//! Every variant carries a stable code prefix so adapters can match on it
//! without parsing free-form messages.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offline worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// No cache entry found for the given request.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Network request failed (offline, DNS, connection refused, aborted).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Network request timed out.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A manifest asset could not be fetched while populating a generation.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Lifecycle transition requested from a state that does not allow it.
    #[error("LIFECYCLE_STATE: {0}")]
    InvalidState(String),

    /// Network failed and neither the request nor the fallback document is cached.
    #[error("OFFLINE_FALLBACK_MISSING: {0}")]
    FallbackMissing(String),
}

impl Error {
    /// Whether this error means the network could not deliver a response.
    ///
    /// These are the failures that send a request down the fallback chain.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::Network(msg) => (-32003, msg.clone()),
            Error::FetchTimeout(msg) => (-32004, msg.clone()),
            Error::FetchTooLarge(msg) => (-32005, msg.clone()),
            Error::InstallFailed(msg) => (-32006, msg.clone()),
            Error::InvalidState(msg) => (-32007, msg.clone()),
            Error::FallbackMissing(msg) => (-32008, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
