//! Reconciliation of fetched facility details against the local store.
//!
//! Change detection is fingerprint-equality against the tracking row, not a
//! field-by-field diff. Inspection rows are replaced wholesale on any
//! change: the portal provides no stable per-row identifier to diff by.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{FacilityDetail, FacilityStatus};
use crate::repository::{FacilityRecord, Result, SyncStore};

/// What an upsert did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
    pub updated: bool,
    pub inspections_added: u64,
}

/// Applies fetched details to the store.
pub struct Reconciler<'a> {
    store: &'a SyncStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a SyncStore) -> Self {
        Self { store }
    }

    /// Create, update, or skip a facility based on its fingerprint, then
    /// replace its inspection set when the detail carries one.
    pub fn upsert(&self, detail: &FacilityDetail) -> Result<UpsertOutcome> {
        let existing = self.store.facilities.find_by_license(&detail.license_number)?;
        let tracking = self.store.tracking.find_by_license(&detail.license_number)?;
        let changed = tracking
            .as_ref()
            .map(|t| t.fingerprint != detail.fingerprint)
            .unwrap_or(true);

        let now = Utc::now();
        let mut outcome = UpsertOutcome::default();

        let facility_id = match existing {
            None => {
                let record = new_facility_record(detail, now);
                self.store.facilities.insert(&record)?;
                outcome.created = true;
                debug!(
                    license = %detail.license_number,
                    id = %record.id,
                    "created facility"
                );
                record.id
            }
            Some(record) => {
                if changed {
                    self.store
                        .facilities
                        .update_mutable(&detail.license_number, detail, now)?;
                    outcome.updated = true;
                    debug!(license = %detail.license_number, "updated facility");
                }
                record.id
            }
        };

        // Refreshed even without a data change, so operators can tell
        // "checked, unchanged" apart from "never reached".
        self.store
            .tracking
            .upsert(&detail.license_number, &detail.fingerprint, now)?;

        if !detail.inspections.is_empty() {
            self.store.inspections.delete_all_for_facility(&facility_id)?;
            outcome.inspections_added = self
                .store
                .inspections
                .insert_many(&facility_id, &detail.inspections)? as u64;
        }

        Ok(outcome)
    }
}

fn new_facility_record(detail: &FacilityDetail, now: DateTime<Utc>) -> FacilityRecord {
    FacilityRecord {
        id: derive_slug(&detail.name, &detail.city, &detail.license_number),
        license_number: detail.license_number.clone(),
        name: detail.name.clone(),
        status: detail.status,
        capacity: detail.capacity,
        street: detail.street.clone(),
        city: detail.city.clone(),
        state: detail.state.clone(),
        zip: detail.zip.clone(),
        county: detail.county.clone(),
        phone: detail.phone.clone(),
        is_active: detail.status == FacilityStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

/// Row id for a new facility: name + locality + license number. The
/// license suffix keeps the slug unique even for same-named homes.
pub fn derive_slug(name: &str, city: &str, license_number: &str) -> String {
    let mut slug = String::new();
    for part in [name, city, license_number] {
        let piece = slugify(part);
        if piece.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&piece);
    }
    slug
}

fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::models::{InspectionKind, InspectionRecord};

    fn open_store() -> (tempfile::TempDir, SyncStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SyncStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn sample_detail() -> FacilityDetail {
        let mut detail = FacilityDetail::new("753201");
        detail.name = "Evergreen Care Home".to_string();
        detail.street = "1418 S Maple St".to_string();
        detail.city = "Spokane".to_string();
        detail.state = "WA".to_string();
        detail.zip = "99203".to_string();
        detail.county = "Spokane".to_string();
        detail.phone = "(509) 555-0132".to_string();
        detail.attach_inspections(vec![
            InspectionRecord {
                effective_date: NaiveDate::from_ymd_opt(2023, 3, 1),
                kind: InspectionKind::Inspection,
                violation_count: 0,
                compliance_numbers: vec!["2023030501".to_string()],
                document_url: "https://example.test/a.pdf".to_string(),
            },
            InspectionRecord {
                effective_date: NaiveDate::from_ymd_opt(2023, 9, 1),
                kind: InspectionKind::FollowUp,
                violation_count: 0,
                compliance_numbers: Vec::new(),
                document_url: "https://example.test/b.pdf".to_string(),
            },
        ]);
        detail
    }

    fn inspection_set(store: &SyncStore, facility_id: &str) -> Vec<(Option<NaiveDate>, String)> {
        let mut set: Vec<_> = store
            .inspections
            .list_for_facility(facility_id)
            .unwrap()
            .into_iter()
            .map(|row| (row.inspected_on, row.document_url))
            .collect();
        set.sort();
        set
    }

    #[test]
    fn test_new_facility_created_once() {
        let (_dir, store) = open_store();
        let reconciler = Reconciler::new(&store);
        let detail = sample_detail();

        let first = reconciler.upsert(&detail).unwrap();
        assert!(first.created);
        assert!(!first.updated);
        assert_eq!(first.inspections_added, 2);

        let record = store.facilities.find_by_license("753201").unwrap().unwrap();
        assert_eq!(record.id, "evergreen-care-home-spokane-753201");
        assert_eq!(store.facilities.count().unwrap(), 1);

        // An identical retry must not duplicate the row.
        let second = reconciler.upsert(&detail).unwrap();
        assert!(!second.created);
        assert!(!second.updated);
        assert_eq!(store.facilities.count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_idempotent_inspection_set() {
        let (_dir, store) = open_store();
        let reconciler = Reconciler::new(&store);
        let detail = sample_detail();

        reconciler.upsert(&detail).unwrap();
        let facility_id = store
            .facilities
            .find_by_license("753201")
            .unwrap()
            .unwrap()
            .id;
        let before = inspection_set(&store, &facility_id);

        // Inspections are delete-and-reinserted, but the resulting set must
        // be unchanged when nothing changed.
        let outcome = reconciler.upsert(&detail).unwrap();
        assert!(!outcome.created && !outcome.updated);
        assert_eq!(inspection_set(&store, &facility_id), before);
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn test_change_detection_updates_mutable_fields() {
        let (_dir, store) = open_store();
        let reconciler = Reconciler::new(&store);
        reconciler.upsert(&sample_detail()).unwrap();

        let mut changed = sample_detail();
        changed.capacity = 8;
        changed.phone = "(509) 555-0200".to_string();
        changed.status = FacilityStatus::Inactive;
        changed.refresh_fingerprint();

        let outcome = reconciler.upsert(&changed).unwrap();
        assert!(!outcome.created);
        assert!(outcome.updated);

        let record = store.facilities.find_by_license("753201").unwrap().unwrap();
        assert_eq!(record.capacity, 8);
        assert_eq!(record.phone, "(509) 555-0200");
        assert_eq!(record.status, FacilityStatus::Inactive);
        assert!(!record.is_active);
    }

    #[test]
    fn test_stale_tracking_row_triggers_update() {
        let (_dir, store) = open_store();
        let reconciler = Reconciler::new(&store);
        let detail = sample_detail();
        reconciler.upsert(&detail).unwrap();

        // Simulate a tracking row from an older capture.
        store
            .tracking
            .upsert("753201", "stale-fingerprint", Utc::now())
            .unwrap();

        let outcome = reconciler.upsert(&detail).unwrap();
        assert!(outcome.updated);

        let tracking = store.tracking.find_by_license("753201").unwrap().unwrap();
        assert_eq!(tracking.fingerprint, detail.fingerprint);
    }

    #[test]
    fn test_tracking_refreshed_without_change() {
        let (_dir, store) = open_store();
        let reconciler = Reconciler::new(&store);
        let detail = sample_detail();

        reconciler.upsert(&detail).unwrap();
        let first = store.tracking.find_by_license("753201").unwrap().unwrap();

        reconciler.upsert(&detail).unwrap();
        let second = store.tracking.find_by_license("753201").unwrap().unwrap();
        assert_eq!(second.fingerprint, first.fingerprint);
        assert!(second.last_synced_at >= first.last_synced_at);
    }

    #[test]
    fn test_empty_inspections_leave_existing_rows() {
        let (_dir, store) = open_store();
        let reconciler = Reconciler::new(&store);
        reconciler.upsert(&sample_detail()).unwrap();
        let facility_id = store
            .facilities
            .find_by_license("753201")
            .unwrap()
            .unwrap()
            .id;
        assert_eq!(inspection_set(&store, &facility_id).len(), 2);

        // A detail with no inspections (documents page failed) must not
        // wipe what we already have.
        let mut bare = sample_detail();
        bare.attach_inspections(Vec::new());
        reconciler.upsert(&bare).unwrap();
        assert_eq!(inspection_set(&store, &facility_id).len(), 2);
    }

    #[test]
    fn test_derive_slug() {
        assert_eq!(
            derive_slug("Evergreen Care Home", "Spokane", "753201"),
            "evergreen-care-home-spokane-753201"
        );
        assert_eq!(
            derive_slug("O'Malley's AFH #2", "Walla Walla", "108844"),
            "o-malley-s-afh-2-walla-walla-108844"
        );
        // Name and city unknown: the license alone still keys the row.
        assert_eq!(derive_slug("", "", "999"), "999");
    }
}
