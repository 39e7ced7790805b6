use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{AttributeMap, BaselineRecord};
use crate::pipeline::crossref::normalize_location;

pub fn insert_baseline_record(
    conn: &Connection,
    record: &BaselineRecord,
) -> Result<(), DatabaseError> {
    let attributes_json = serde_json::to_string(&record.attributes)?;
    conn.execute(
        "INSERT OR REPLACE INTO baseline_records
         (id, project_id, submittal_id, approved_on, category, location,
          location_key, attributes_json, sheet_ref)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id.to_string(),
            record.project_id,
            record.submittal_id,
            record.approved_on.format("%Y-%m-%d").to_string(),
            record.category,
            record.location,
            normalize_location(&record.location),
            attributes_json,
            record.sheet_ref,
        ],
    )?;
    Ok(())
}

/// Insert many records in one transaction. Returns the number written.
pub fn import_baseline_records(
    conn: &Connection,
    records: &[BaselineRecord],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    for record in records {
        insert_baseline_record(&tx, record)?;
    }
    tx.commit()?;
    Ok(records.len())
}

/// Candidate baseline records for a project and category.
///
/// Rows whose normalized location equals `location` come first, then the
/// rest; within each group most recently approved first. Similarity
/// filtering is the cross-referencer's job.
pub fn lookup_baseline_records(
    conn: &Connection,
    project_id: &str,
    category: &str,
    location: &str,
) -> Result<Vec<BaselineRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, submittal_id, approved_on, category, location,
                attributes_json, sheet_ref
         FROM baseline_records
         WHERE project_id = ?1 AND category = ?2
         ORDER BY (location_key = ?3) DESC, approved_on DESC, id ASC",
    )?;

    let rows = stmt.query_map(
        params![project_id, category, normalize_location(location)],
        |row| {
            Ok(BaselineRow {
                id: row.get(0)?,
                project_id: row.get(1)?,
                submittal_id: row.get(2)?,
                approved_on: row.get(3)?,
                category: row.get(4)?,
                location: row.get(5)?,
                attributes_json: row.get(6)?,
                sheet_ref: row.get(7)?,
            })
        },
    )?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

pub fn count_baseline_records(conn: &Connection, project_id: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM baseline_records WHERE project_id = ?1",
        params![project_id],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

struct BaselineRow {
    id: String,
    project_id: String,
    submittal_id: String,
    approved_on: String,
    category: String,
    location: String,
    attributes_json: String,
    sheet_ref: Option<String>,
}

impl BaselineRow {
    fn into_record(self) -> Result<BaselineRecord, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
        let approved_on = NaiveDate::parse_from_str(&self.approved_on, "%Y-%m-%d")
            .map_err(|e| {
                DatabaseError::ConstraintViolation(format!(
                    "baseline {} approved_on '{}': {e}",
                    self.id, self.approved_on
                ))
            })?;
        let attributes: AttributeMap = serde_json::from_str(&self.attributes_json)?;

        Ok(BaselineRecord {
            id,
            project_id: self.project_id,
            submittal_id: self.submittal_id,
            approved_on,
            category: self.category,
            location: self.location,
            attributes,
            sheet_ref: self.sheet_ref,
        })
    }
}
