//! Generation lifecycle operations.
//!
//! A generation is a named container of entries, one per deployed version.
//! The store only knows names; deciding which name is current belongs to the
//! caller.

use super::connection::CacheDb;
use super::entries::{self, CacheEntry};
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Build the name of the generation for `version`.
pub fn generation_name(prefix: &str, version: &str) -> String {
    format!("{prefix}-{version}")
}

/// Summary of one stored generation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationSummary {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

/// Handle to a named generation.
///
/// Holding a handle does not keep the generation alive; a concurrent
/// [`CacheDb::delete_generation`] makes later `put`s fail and `get`s miss.
#[derive(Clone, Debug)]
pub struct Generation {
    db: CacheDb,
    name: String,
}

impl Generation {
    /// Name of this generation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get an entry by its request key.
    ///
    /// Returns None if the key (or the whole generation) doesn't exist.
    pub async fn get(&self, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let name = self.name.clone();
        let key_hash = key_hash.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> { entries::select(conn, &name, &key_hash) })
            .await
            .map_err(Error::from)
    }

    /// Get the entry stored for `method url`.
    pub async fn match_request(&self, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        self.get(&compute_cache_key(method, url)).await
    }

    /// Insert or overwrite an entry.
    ///
    /// Fails with `CacheMiss` if the generation has been deleted; a pruned
    /// generation is never recreated by a late write.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        let name = self.name.clone();
        let entry = entry.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::CacheMiss(format!("generation {name} does not exist")));
                }
                entries::upsert(&tx, &name, &entry)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in this generation.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in this generation, sorted.
    pub async fn urls(&self) -> Result<Vec<String>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Handle to `name` without creating it.
    pub fn generation(&self, name: &str) -> Generation {
        Generation { db: self.clone(), name: name.to_string() }
    }

    /// Open a generation, creating it if absent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(self.generation(name))
    }

    /// Create (if needed) and populate a generation in one transaction.
    ///
    /// Either every entry is written or nothing is, including the
    /// generation row itself.
    pub async fn commit_generation(&self, name: &str, batch: Vec<CacheEntry>) -> Result<Generation, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                for entry in &batch {
                    entries::upsert(&tx, &owned, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(self.generation(name))
    }

    /// Names of all stored generations, sorted.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Name, creation time and entry count of every generation.
    pub async fn generation_summaries(&self) -> Result<Vec<GenerationSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, COUNT(e.key_hash)
                    FROM generations g LEFT JOIN entries e ON e.generation = g.name
                    GROUP BY g.name, g.created_at
                    ORDER BY g.name",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(GenerationSummary {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }
}
