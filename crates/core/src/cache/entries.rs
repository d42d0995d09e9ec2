//! Cache entry model and row mapping.
//!
//! An entry is one captured response stored under its request key inside a
//! generation. Headers are kept as an ordered list of pairs so duplicates and
//! ordering survive a round trip.

use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A captured response stored in a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheEntry {
    /// Build an entry for `method url`, computing its key and timestamp.
    pub fn new(method: &str, url: &str, status_code: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            key_hash: compute_cache_key(method, url),
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            status_code,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Insert or replace `entry` under `generation`.
///
/// The generation row must already exist.
pub(crate) fn upsert(conn: &rusqlite::Connection, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
    let headers_json =
        serde_json::to_string(&entry.headers).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;

    conn.execute(
        "INSERT INTO entries (generation, key_hash, method, url, status_code, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(generation, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status_code = excluded.status_code,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            entry.status_code,
            headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

/// Look up one entry by key inside `generation`.
pub(crate) fn select(
    conn: &rusqlite::Connection, generation: &str, key_hash: &str,
) -> Result<Option<CacheEntry>, Error> {
    let mut stmt = conn.prepare(
        "SELECT key_hash, method, url, status_code, headers_json, body, stored_at
        FROM entries WHERE generation = ?1 AND key_hash = ?2",
    )?;

    let row = stmt
        .query_row(params![generation, key_hash], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u16>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Vec<u8>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .optional()?;

    let Some((key_hash, method, url, status_code, headers_json, body, stored_at)) = row else {
        return Ok(None);
    };

    let headers: Vec<(String, String)> =
        serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;

    Ok(Some(CacheEntry { key_hash, method, url, status_code, headers, body, stored_at }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_key_matches_hash() {
        let entry = CacheEntry::new("get", "https://example.com/a.css", 200, Vec::new(), b"body".to_vec());
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.key_hash, compute_cache_key("GET", "https://example.com/a.css"));
        assert!(!entry.stored_at.is_empty());
    }
}
