//! Facility repository.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{connect, parse_datetime, to_option, Result};
use crate::models::{FacilityDetail, FacilityStatus, DEFAULT_CAPACITY};

/// A persisted facility row.
///
/// The row id is a derived slug rather than the license number: the table
/// may carry records seeded from other sources, and the license number is
/// only the join key for registry-sourced rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityRecord {
    pub id: String,
    pub license_number: String,
    pub name: String,
    pub status: FacilityStatus,
    pub capacity: u32,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub county: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed facility repository.
pub struct FacilityRepository {
    db_path: PathBuf,
}

impl FacilityRepository {
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
            CREATE TABLE IF NOT EXISTS facilities (
                id TEXT PRIMARY KEY,
                license_number TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                street TEXT NOT NULL,
                city TEXT NOT NULL,
                state TEXT NOT NULL,
                zip TEXT NOT NULL,
                county TEXT NOT NULL,
                phone TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_facilities_county ON facilities(county);
        "#,
        )?;
        Ok(())
    }

    /// Look a facility up by its license number.
    pub fn find_by_license(&self, license_number: &str) -> Result<Option<FacilityRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM facilities WHERE license_number = ?")?;

        to_option(stmt.query_row(params![license_number], |row| {
            Ok(FacilityRecord {
                id: row.get("id")?,
                license_number: row.get("license_number")?,
                name: row.get("name")?,
                status: FacilityStatus::from_str(&row.get::<_, String>("status")?)
                    .unwrap_or(FacilityStatus::Active),
                capacity: row.get::<_, i64>("capacity")?.try_into().unwrap_or(DEFAULT_CAPACITY),
                street: row.get("street")?,
                city: row.get("city")?,
                state: row.get("state")?,
                zip: row.get("zip")?,
                county: row.get("county")?,
                phone: row.get("phone")?,
                is_active: row.get("is_active")?,
                created_at: parse_datetime(&row.get::<_, String>("created_at")?),
                updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
            })
        }))
    }

    /// Insert a new facility row.
    pub fn insert(&self, record: &FacilityRecord) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO facilities (
                id, license_number, name, status, capacity,
                street, city, state, zip, county, phone,
                is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                record.id,
                record.license_number,
                record.name,
                record.status.as_str(),
                record.capacity,
                record.street,
                record.city,
                record.state,
                record.zip,
                record.county,
                record.phone,
                record.is_active,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Update the mutable subset of fields from a fetched detail: status,
    /// capacity, phone, active flag, and the updated timestamp. Identity
    /// fields (name, address, slug) are not touched on update.
    pub fn update_mutable(
        &self,
        license_number: &str,
        detail: &FacilityDetail,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE facilities
            SET status = ?1, capacity = ?2, phone = ?3, is_active = ?4, updated_at = ?5
            WHERE license_number = ?6
            "#,
            params![
                detail.status.as_str(),
                detail.capacity,
                detail.phone,
                detail.status == FacilityStatus::Active,
                updated_at.to_rfc3339(),
                license_number,
            ],
        )?;
        Ok(())
    }

    /// Number of facility rows (operator status output).
    pub fn count(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM facilities", [], |row| row.get(0))?;
        Ok(count)
    }
}
