//! Sync run log repository.
//!
//! The run record is inserted at run start and updated incrementally, so a
//! crashed run still shows its partial counters to operators.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::params;

use super::{connect, parse_datetime, parse_datetime_opt, to_option, Result};
use crate::models::{SyncCounters, SyncRunRecord, SyncRunStatus, SyncRunType};

/// SQLite-backed sync run log.
pub struct SyncRunRepository {
    db_path: PathBuf,
}

impl SyncRunRepository {
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
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_type TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                checked INTEGER NOT NULL DEFAULT 0,
                added INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                inspections_added INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            );
        "#,
        )?;
        Ok(())
    }

    /// Insert a new run record, returning its row id.
    pub fn insert(&self, record: &SyncRunRecord) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO sync_runs (
                run_type, status, started_at, finished_at,
                checked, added, updated, inspections_added, error_message
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.run_type.as_str(),
                record.status.as_str(),
                record.started_at.to_rfc3339(),
                record.finished_at.map(|dt| dt.to_rfc3339()),
                record.counters.checked,
                record.counters.added,
                record.counters.updated,
                record.counters.inspections_added,
                record.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update the running counters mid-run.
    pub fn update_progress(&self, id: i64, counters: &SyncCounters) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE sync_runs
            SET checked = ?1, added = ?2, updated = ?3, inspections_added = ?4
            WHERE id = ?5
            "#,
            params![
                counters.checked,
                counters.added,
                counters.updated,
                counters.inspections_added,
                id,
            ],
        )?;
        Ok(())
    }

    /// Finalize a run to a terminal status with its final counters.
    pub fn finalize(
        &self,
        id: i64,
        status: SyncRunStatus,
        counters: &SyncCounters,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE sync_runs
            SET status = ?1, finished_at = ?2,
                checked = ?3, added = ?4, updated = ?5, inspections_added = ?6,
                error_message = ?7
            WHERE id = ?8
            "#,
            params![
                status.as_str(),
                Utc::now().to_rfc3339(),
                counters.checked,
                counters.added,
                counters.updated,
                counters.inspections_added,
                error_message,
                id,
            ],
        )?;
        Ok(())
    }

    /// Get a run record by id.
    pub fn get(&self, id: i64) -> Result<Option<SyncRunRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sync_runs WHERE id = ?")?;
        to_option(stmt.query_row(params![id], map_run_row))
    }

    /// Most recent runs, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SyncRunRecord>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM sync_runs ORDER BY started_at DESC, id DESC LIMIT ?")?;
        let rows = stmt
            .query_map(params![limit as i64], map_run_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRunRecord> {
    Ok(SyncRunRecord {
        id: row.get("id")?,
        run_type: SyncRunType::from_str(&row.get::<_, String>("run_type")?)
            .unwrap_or(SyncRunType::Full),
        status: SyncRunStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(SyncRunStatus::Failed),
        started_at: parse_datetime(&row.get::<_, String>("started_at")?),
        finished_at: parse_datetime_opt(row.get::<_, Option<String>>("finished_at")?),
        counters: SyncCounters {
            checked: row.get::<_, i64>("checked")? as u64,
            added: row.get::<_, i64>("added")? as u64,
            updated: row.get::<_, i64>("updated")? as u64,
            inspections_added: row.get::<_, i64>("inspections_added")? as u64,
        },
        error_message: row.get("error_message")?,
    })
}
