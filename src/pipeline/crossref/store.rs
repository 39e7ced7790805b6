use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::matcher::normalize_location;
use crate::db::{self, DatabaseError};
use crate::models::BaselineRecord;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BaselineStoreError {
    /// Busy, locked or unreachable. Worth retrying.
    #[error("Baseline store unavailable: {0}")]
    Unavailable(String),

    #[error("Baseline query failed: {0}")]
    Query(String),
}

impl BaselineStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for BaselineStoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
                ) =>
            {
                Self::Unavailable(e.to_string())
            }
            _ => Self::Query(e.to_string()),
        }
    }
}

impl From<DatabaseError> for BaselineStoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Sqlite(inner) => inner.into(),
            other => Self::Query(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A consistent read view of the baseline, held for one document's
/// cross-reference pass.
pub trait BaselineReader {
    /// Candidates for `(project_id, category)`; records whose normalized
    /// location equals `location` come first, then most recently approved.
    fn lookup(
        &self,
        project_id: &str,
        category: &str,
        location: &str,
    ) -> Result<Vec<BaselineRecord>, BaselineStoreError>;
}

/// Source of approved specifications. Read-only to the pipeline.
pub trait BaselineStore: Send + Sync {
    /// Check out a reader with its own read transaction.
    fn reader(&self) -> Result<Box<dyn BaselineReader + '_>, BaselineStoreError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Opens a fresh read-only connection per checkout.
pub struct SqliteBaselineStore {
    path: PathBuf,
}

impl SqliteBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct SqliteReader {
    conn: Connection,
}

impl BaselineStore for SqliteBaselineStore {
    fn reader(&self) -> Result<Box<dyn BaselineReader + '_>, BaselineStoreError> {
        let conn = db::open_read_only(&self.path)?;
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Box::new(SqliteReader { conn }))
    }
}

impl BaselineReader for SqliteReader {
    fn lookup(
        &self,
        project_id: &str,
        category: &str,
        location: &str,
    ) -> Result<Vec<BaselineRecord>, BaselineStoreError> {
        Ok(db::lookup_baseline_records(
            &self.conn, project_id, category, location,
        )?)
    }
}

impl Drop for SqliteReader {
    fn drop(&mut self) {
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::debug!(error = %e, "Baseline read transaction already closed");
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Baseline held in memory, ordered like the SQLite store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBaselineStore {
    records: Vec<BaselineRecord>,
}

impl InMemoryBaselineStore {
    pub fn new(records: Vec<BaselineRecord>) -> Self {
        Self { records }
    }
}

struct InMemoryReader<'a> {
    records: &'a [BaselineRecord],
}

impl BaselineStore for InMemoryBaselineStore {
    fn reader(&self) -> Result<Box<dyn BaselineReader + '_>, BaselineStoreError> {
        Ok(Box::new(InMemoryReader {
            records: &self.records,
        }))
    }
}

impl BaselineReader for InMemoryReader<'_> {
    fn lookup(
        &self,
        project_id: &str,
        category: &str,
        location: &str,
    ) -> Result<Vec<BaselineRecord>, BaselineStoreError> {
        let key = normalize_location(location);
        let mut found: Vec<BaselineRecord> = self
            .records
            .iter()
            .filter(|r| r.project_id == project_id && r.category == category)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            let a_exact = normalize_location(&a.location) == key;
            let b_exact = normalize_location(&b.location) == key;
            b_exact
                .cmp(&a_exact)
                .then(b.approved_on.cmp(&a.approved_on))
                .then(a.id.to_string().cmp(&b.id.to_string()))
        });
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubles each time,
    /// capped at `max_delay_ms`.
    pub fn delay_before(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}
