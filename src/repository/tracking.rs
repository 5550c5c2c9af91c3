//! Sync tracking repository.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{connect, parse_datetime, to_option, Result};
use crate::models::SyncTrackingRecord;

/// SQLite-backed tracking repository: last fingerprint and last-synced
/// timestamp per license number.
pub struct TrackingRepository {
    db_path: PathBuf,
}

impl TrackingRepository {
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
            CREATE TABLE IF NOT EXISTS sync_tracking (
                license_number TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                last_synced_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Get the tracking record for a license number.
    pub fn find_by_license(&self, license_number: &str) -> Result<Option<SyncTrackingRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sync_tracking WHERE license_number = ?")?;

        to_option(stmt.query_row(params![license_number], |row| {
            Ok(SyncTrackingRecord {
                license_number: row.get("license_number")?,
                fingerprint: row.get("fingerprint")?,
                last_synced_at: parse_datetime(&row.get::<_, String>("last_synced_at")?),
            })
        }))
    }

    /// Insert or refresh the tracking record for a license number.
    pub fn upsert(
        &self,
        license_number: &str,
        fingerprint: &str,
        last_synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO sync_tracking (license_number, fingerprint, last_synced_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(license_number) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                last_synced_at = excluded.last_synced_at
            "#,
            params![license_number, fingerprint, last_synced_at.to_rfc3339()],
        )?;
        Ok(())
    }
}
