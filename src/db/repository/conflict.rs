use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::Severity;
use crate::models::{BaselineRef, Conflict, Money};

/// Persist a document's conflicts in emission order, replacing any previous
/// run for the same document.
pub fn save_conflicts(
    conn: &Connection,
    project_id: &str,
    document_id: &Uuid,
    conflicts: &[Conflict],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM conflicts WHERE document_id = ?1",
        params![document_id.to_string()],
    )?;

    for (position, conflict) in conflicts.iter().enumerate() {
        if conflict.cost_impact.is_negative() {
            return Err(DatabaseError::ConstraintViolation(format!(
                "conflict {} has negative cost impact",
                conflict.id
            )));
        }
        tx.execute(
            "INSERT INTO conflicts
             (id, document_id, project_id, position, severity, category, location,
              old_spec_json, new_spec_json, differing_json, primary_attribute, sheet_ref,
              cost_cents, cost_breakdown_json, reasoning, submittal_id, approved_on,
              match_confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                conflict.id.to_string(),
                document_id.to_string(),
                project_id,
                position as i64,
                conflict.severity.as_str(),
                conflict.category,
                conflict.location,
                serde_json::to_string(&conflict.old_spec)?,
                serde_json::to_string(&conflict.new_spec)?,
                serde_json::to_string(&conflict.differing_attributes)?,
                conflict.primary_attribute,
                conflict.sheet_ref,
                conflict.cost_impact.cents(),
                serde_json::to_string(&conflict.cost_breakdown)?,
                conflict.reasoning,
                conflict.baseline.submittal_id,
                conflict.baseline.approved_on.format("%Y-%m-%d").to_string(),
                conflict.match_confidence,
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Load a document's conflicts in the order they were emitted.
pub fn load_conflicts(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<Conflict>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, severity, category, location, old_spec_json, new_spec_json,
                differing_json, primary_attribute, sheet_ref, cost_cents,
                cost_breakdown_json, reasoning, submittal_id, approved_on, match_confidence
         FROM conflicts WHERE document_id = ?1 ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![document_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, i64>(9)?,
            row.get::<_, String>(10)?,
            row.get::<_, String>(11)?,
            row.get::<_, String>(12)?,
            row.get::<_, String>(13)?,
            row.get::<_, f64>(14)?,
        ))
    })?;

    let mut conflicts = Vec::new();
    for row in rows {
        let (
            id,
            severity,
            category,
            location,
            old_spec,
            new_spec,
            differing,
            primary_attribute,
            sheet_ref,
            cost_cents,
            breakdown,
            reasoning,
            submittal_id,
            approved_on,
            match_confidence,
        ) = row?;

        conflicts.push(Conflict {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            document_id: *document_id,
            severity: Severity::from_str(&severity)?,
            category,
            location,
            old_spec: serde_json::from_str(&old_spec)?,
            new_spec: serde_json::from_str(&new_spec)?,
            differing_attributes: serde_json::from_str(&differing)?,
            primary_attribute,
            sheet_ref,
            cost_impact: Money::from_cents(cost_cents),
            cost_breakdown: serde_json::from_str(&breakdown)?,
            reasoning,
            baseline: BaselineRef {
                submittal_id,
                approved_on: NaiveDate::parse_from_str(&approved_on, "%Y-%m-%d")
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            },
            match_confidence: match_confidence as f32,
        });
    }
    Ok(conflicts)
}
