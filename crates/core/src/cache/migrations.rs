//! Schema migrations for the generation store.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its version row, so a failed
//! batch leaves neither schema changes nor a recorded version behind.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

/// One schema step.
pub(crate) struct Migration {
    pub version: i64,
    pub sql: &'static str,
}

/// Embedded migrations in ascending version order.
pub(crate) const MIGRATIONS: &[Migration] =
    &[Migration { version: 1, sql: include_str!("../../migrations/001_generations.sql") }];

/// Apply every embedded migration newer than the recorded version.
///
/// # Errors
///
/// `CACHE_ERROR` if a migration fails; earlier migrations stay applied.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| apply(conn, MIGRATIONS))
        .await
        .map_err(Error::from)
}

/// Apply `migrations` to a synchronous connection.
pub(crate) fn apply(conn: &mut rusqlite::Connection, migrations: &[Migration]) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

    for migration in migrations.iter().filter(|m| m.version > current) {
        tracing::debug!(version = migration.version, "applying cache migration");

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| Error::MigrationFailed(format!("version {}: {e}", migration.version)))?;
        tx.execute(
            "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
    }

    Ok(())
}
