//! Inspection event repository.
//!
//! Inspection rows are owned by their facility and replaced wholesale on
//! every detected change: the portal provides no stable identifier for an
//! individual inspection entry, so there is nothing to diff against.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use tracing::{debug, warn};

use super::{connect, parse_date_opt, parse_datetime, Result};
use crate::models::{InspectionKind, InspectionRecord};

/// A persisted inspection row.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionRow {
    pub id: i64,
    pub facility_id: String,
    pub inspected_on: Option<NaiveDate>,
    pub kind: InspectionKind,
    pub violation_count: u32,
    pub compliance_numbers: Vec<String>,
    pub document_url: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed inspection repository.
pub struct InspectionRepository {
    db_path: PathBuf,
}

impl InspectionRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<rusqlite::Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS facility_inspections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                facility_id TEXT NOT NULL,
                inspected_on TEXT NOT NULL,
                kind TEXT NOT NULL,
                violation_count INTEGER NOT NULL,
                compliance_numbers TEXT NOT NULL,
                document_url TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_inspections_facility
                ON facility_inspections(facility_id);
        "#,
        )?;
        Ok(())
    }

    /// Delete every inspection row for a facility. Returns the number removed.
    pub fn delete_all_for_facility(&self, facility_id: &str) -> Result<usize> {
        let conn = self.connect()?;
        let rows = conn.execute(
            "DELETE FROM facility_inspections WHERE facility_id = ?",
            params![facility_id],
        )?;
        Ok(rows)
    }

    /// Insert the current inspection set for a facility, returning how many
    /// rows landed. Records without a parseable date are skipped, and a
    /// single failed insert does not abort the rest.
    pub fn insert_many(&self, facility_id: &str, records: &[InspectionRecord]) -> Result<usize> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;
        for record in records {
            let Some(date) = record.effective_date else {
                debug!(
                    facility_id,
                    url = %record.document_url,
                    "skipping inspection without a parseable date"
                );
                continue;
            };
            let numbers = serde_json::to_string(&record.compliance_numbers)?;
            let result = conn.execute(
                r#"
                INSERT INTO facility_inspections (
                    facility_id, inspected_on, kind, violation_count,
                    compliance_numbers, document_url, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    facility_id,
                    date.to_string(),
                    record.kind.as_str(),
                    record.violation_count,
                    numbers,
                    record.document_url,
                    now,
                ],
            );
            match result {
                Ok(_) => inserted += 1,
                Err(e) => warn!(
                    facility_id,
                    error = %e,
                    "failed to insert inspection row; continuing"
                ),
            }
        }
        Ok(inserted)
    }

    /// All inspection rows for a facility, oldest first.
    pub fn list_for_facility(&self, facility_id: &str) -> Result<Vec<InspectionRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM facility_inspections WHERE facility_id = ? ORDER BY inspected_on",
        )?;

        let rows = stmt
            .query_map(params![facility_id], |row| {
                Ok(InspectionRow {
                    id: row.get("id")?,
                    facility_id: row.get("facility_id")?,
                    inspected_on: parse_date_opt(row.get::<_, Option<String>>("inspected_on")?),
                    kind: InspectionKind::from_str(&row.get::<_, String>("kind")?)
                        .unwrap_or(InspectionKind::Inspection),
                    violation_count: row.get("violation_count")?,
                    compliance_numbers: serde_json::from_str(
                        &row.get::<_, String>("compliance_numbers")?,
                    )
                    .unwrap_or_default(),
                    document_url: row.get("document_url")?,
                    created_at: parse_datetime(&row.get::<_, String>("created_at")?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
