//! Bundled store handed to the sync engine.

use std::path::Path;

use super::{
    FacilityRepository, InspectionRepository, Result, SyncRunRepository, TrackingRepository,
};

/// All repositories the sync pipeline writes to, sharing one database file.
pub struct SyncStore {
    pub facilities: FacilityRepository,
    pub inspections: InspectionRepository,
    pub tracking: TrackingRepository,
    pub runs: SyncRunRepository,
}

impl SyncStore {
    /// Open (and if needed initialize) the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            facilities: FacilityRepository::new(db_path)?,
            inspections: InspectionRepository::new(db_path)?,
            tracking: TrackingRepository::new(db_path)?,
            runs: SyncRunRepository::new(db_path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    use crate::models::{
        FacilityStatus, InspectionKind, InspectionRecord, SyncCounters, SyncRunRecord,
        SyncRunStatus, SyncRunType,
    };
    use crate::repository::FacilityRecord;

    fn open_store() -> (tempfile::TempDir, SyncStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SyncStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn sample_record(license: &str) -> FacilityRecord {
        let now = Utc::now();
        FacilityRecord {
            id: format!("evergreen-care-home-spokane-{}", license),
            license_number: license.to_string(),
            name: "Evergreen Care Home".to_string(),
            status: FacilityStatus::Active,
            capacity: 6,
            street: "1418 S Maple St".to_string(),
            city: "Spokane".to_string(),
            state: "WA".to_string(),
            zip: "99203".to_string(),
            county: "Spokane".to_string(),
            phone: "(509) 555-0132".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_inspection(month: u32) -> InspectionRecord {
        InspectionRecord {
            effective_date: NaiveDate::from_ymd_opt(2023, month, 1),
            kind: InspectionKind::Inspection,
            violation_count: 0,
            compliance_numbers: vec!["2023061401".to_string()],
            document_url: format!("https://example.test/{month}.pdf"),
        }
    }

    #[test]
    fn test_facility_insert_and_find() {
        let (_dir, store) = open_store();
        let record = sample_record("753201");
        store.facilities.insert(&record).unwrap();

        let found = store.facilities.find_by_license("753201").unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.name, record.name);
        assert_eq!(found.capacity, 6);
        assert!(found.is_active);

        assert!(store.facilities.find_by_license("000000").unwrap().is_none());
    }

    #[test]
    fn test_facility_update_mutable() {
        let (_dir, store) = open_store();
        store.facilities.insert(&sample_record("753201")).unwrap();

        let mut detail = crate::models::FacilityDetail::new("753201");
        detail.status = FacilityStatus::Inactive;
        detail.capacity = 4;
        detail.phone = "(509) 555-0199".to_string();

        store
            .facilities
            .update_mutable("753201", &detail, Utc::now())
            .unwrap();

        let found = store.facilities.find_by_license("753201").unwrap().unwrap();
        assert_eq!(found.status, FacilityStatus::Inactive);
        assert_eq!(found.capacity, 4);
        assert_eq!(found.phone, "(509) 555-0199");
        assert!(!found.is_active);
        // Identity fields untouched.
        assert_eq!(found.name, "Evergreen Care Home");
        assert_eq!(found.street, "1418 S Maple St");
    }

    #[test]
    fn test_inspection_replace_cycle() {
        let (_dir, store) = open_store();
        let facility_id = "some-facility";

        let inserted = store
            .inspections
            .insert_many(facility_id, &[sample_inspection(3), sample_inspection(6)])
            .unwrap();
        assert_eq!(inserted, 2);

        let rows = store.inspections.list_for_facility(facility_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].inspected_on, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(rows[0].compliance_numbers, vec!["2023061401".to_string()]);

        let removed = store.inspections.delete_all_for_facility(facility_id).unwrap();
        assert_eq!(removed, 2);
        assert!(store.inspections.list_for_facility(facility_id).unwrap().is_empty());
    }

    #[test]
    fn test_inspection_insert_skips_undated_rows() {
        let (_dir, store) = open_store();
        let undated = InspectionRecord {
            effective_date: None,
            ..sample_inspection(6)
        };
        let inserted = store
            .inspections
            .insert_many("f", &[undated, sample_inspection(6)])
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.inspections.list_for_facility("f").unwrap().len(), 1);
    }

    #[test]
    fn test_tracking_upsert_and_find() {
        let (_dir, store) = open_store();
        assert!(store.tracking.find_by_license("753201").unwrap().is_none());

        store
            .tracking
            .upsert("753201", "fingerprint-a", Utc::now())
            .unwrap();
        let first = store.tracking.find_by_license("753201").unwrap().unwrap();
        assert_eq!(first.fingerprint, "fingerprint-a");

        store
            .tracking
            .upsert("753201", "fingerprint-b", Utc::now())
            .unwrap();
        let second = store.tracking.find_by_license("753201").unwrap().unwrap();
        assert_eq!(second.fingerprint, "fingerprint-b");
        assert!(second.last_synced_at >= first.last_synced_at);
    }

    #[test]
    fn test_run_record_lifecycle() {
        let (_dir, store) = open_store();
        let record = SyncRunRecord::new(SyncRunType::Full);
        let id = store.runs.insert(&record).unwrap();
        assert!(id > 0);

        let running = store.runs.get(id).unwrap().unwrap();
        assert_eq!(running.status, SyncRunStatus::Running);
        assert!(running.finished_at.is_none());

        let counters = SyncCounters {
            checked: 10,
            added: 2,
            updated: 1,
            inspections_added: 5,
        };
        store.runs.update_progress(id, &counters).unwrap();
        let progressed = store.runs.get(id).unwrap().unwrap();
        assert_eq!(progressed.counters.checked, 10);
        assert_eq!(progressed.status, SyncRunStatus::Running);

        store
            .runs
            .finalize(id, SyncRunStatus::Success, &counters, None)
            .unwrap();
        let finished = store.runs.get(id).unwrap().unwrap();
        assert_eq!(finished.status, SyncRunStatus::Success);
        assert!(finished.finished_at.is_some());
        assert!(finished.error_message.is_none());
    }

    #[test]
    fn test_run_record_failure_keeps_error() {
        let (_dir, store) = open_store();
        let id = store
            .runs
            .insert(&SyncRunRecord::new(SyncRunType::SingleCounty))
            .unwrap();
        let counters = SyncCounters {
            checked: 3,
            ..Default::default()
        };
        store
            .runs
            .finalize(id, SyncRunStatus::Failed, &counters, Some("session died"))
            .unwrap();

        let failed = store.runs.get(id).unwrap().unwrap();
        assert_eq!(failed.status, SyncRunStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("session died"));
        assert_eq!(failed.counters.checked, 3);
    }

    #[test]
    fn test_recent_runs_ordering() {
        let (_dir, store) = open_store();
        for _ in 0..3 {
            store
                .runs
                .insert(&SyncRunRecord::new(SyncRunType::Full))
                .unwrap();
        }
        let recent = store.runs.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id > recent[1].id);
    }
}
