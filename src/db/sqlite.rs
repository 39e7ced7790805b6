use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use super::DatabaseError;

/// Ordered schema migrations. Each script records its own version row.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../resources/migrations/001_baseline.sql")),
    (2, include_str!("../../resources/migrations/002_conflicts.sql")),
];

/// Readers wait this long on a writer's lock before reporting SQLITE_BUSY.
const READ_BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Open (creating if needed) the baseline database and bring its schema
/// up to date. Used by the import and persist paths, never by the pipeline.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    // Rollback journal: read-only openers must not need to create -wal/-shm files.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema (tests and dry runs).
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an existing database read-only. No migrations are run; the
/// pipeline never writes to the baseline.
pub fn open_read_only(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(READ_BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Apply every migration newer than the recorded schema version, each in
/// its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn)?;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tracing::info!(version, "Applying baseline schema migration");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .and_then(|_| tx.commit())
            .map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// Highest applied migration, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}
