//! Repository layer for SQLite persistence.
//!
//! The facilities, sync tracking, and sync run stores are independently
//! keyed and unified only by the license number, because the facility table may
//! have been seeded from other sources before registry sync ever runs.

mod facility;
mod inspection;
mod store;
mod sync_run;
mod tracking;

pub use facility::{FacilityRecord, FacilityRepository};
pub use inspection::{InspectionRepository, InspectionRow};
pub use store::SyncStore;
pub use sync_run::SyncRunRepository;
pub use tracking::TrackingRepository;

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

/// Repository error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open a connection with the pragmas every repository relies on.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    "#,
    )?;
    Ok(conn)
}

/// Map QueryReturnedNoRows to None instead of an error.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Parse an optional date column ("YYYY-MM-DD").
pub(crate) fn parse_date_opt(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_roundtrip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_datetime_invalid_defaults_to_epoch() {
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_datetime_opt() {
        assert_eq!(parse_datetime_opt(None), None);
        assert_eq!(parse_datetime_opt(Some("bad".to_string())), None);
        assert!(parse_datetime_opt(Some(Utc::now().to_rfc3339())).is_some());
    }

    #[test]
    fn test_parse_date_opt() {
        assert_eq!(
            parse_date_opt(Some("2023-06-01".to_string())),
            NaiveDate::from_ymd_opt(2023, 6, 1)
        );
        assert_eq!(parse_date_opt(Some("06/2023".to_string())), None);
        assert_eq!(parse_date_opt(None), None);
    }
}
