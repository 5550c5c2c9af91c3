//! End-to-end pipeline test: portal HTML fixtures through extraction,
//! merge, and reconciliation into a scratch store. No browser involved:
//! the extraction layer is pure and the store is a temp file.

use dshs_sync::extract::{
    merge_documents_page, parse_facility_detail, parse_facility_list, parse_inspection_documents,
};
use dshs_sync::models::FacilityStatus;
use dshs_sync::repository::SyncStore;
use dshs_sync::sync::Reconciler;

const LIST_PAGE: &str = r#"
    <html><body>
    <table id="resultsGrid">
      <tr><th>License</th><th>Name</th><th>Address</th><th>Phone</th></tr>
      <tr>
        <td>753201</td>
        <td>"Evergreen Care Home"</td>
        <td>1418 S Maple St<br>Spokane, WA 99203</td>
        <td>(509) 555-0132</td>
      </tr>
    </table>
    </body></html>
"#;

const DETAIL_PAGE: &str = r#"
    <html><body>
    <table class="detail">
      <tr><th>Facility Name</th><td>Runtime Error</td></tr>
      <tr><th>Facility Status</th><td>Active</td></tr>
      <tr><th>Licensed Beds</th><td>5</td></tr>
      <tr><th>Facility Address</th><td>1418 S Maple St<br>Spokane, WA 99203</td></tr>
      <tr><th>County</th><td>Spokane</td></tr>
      <tr><th>Telephone</th><td>(509) 555-0132</td></tr>
    </table>
    </body></html>
"#;

const DOCUMENTS_PAGE: &str = r#"
    <html><body>
    <h2>Evergreen Care Home</h2>
    <a href="docs/753201 2023061401.pdf">Full Inspection 06/2023</a>
    <a href="docs/753201 2022110902.pdf">Complaint Investigation 11/2022</a>
    </body></html>
"#;

#[test]
fn fixtures_flow_through_to_the_store() {
    let stubs = parse_facility_list(LIST_PAGE);
    assert_eq!(stubs.len(), 1);
    let stub = &stubs[0];
    assert_eq!(stub.license_number, "753201");

    // Detail fetch: base record, then documents page merged on top. The
    // detail page's name field rendered the portal's error text, so the
    // documents page name wins.
    let mut detail = parse_facility_detail(&stub.license_number, DETAIL_PAGE);
    assert_eq!(detail.name, "Runtime Error");
    merge_documents_page(&mut detail, parse_inspection_documents(DOCUMENTS_PAGE));
    assert_eq!(detail.name, "Evergreen Care Home");
    assert_eq!(detail.inspections.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let store = SyncStore::open(&dir.path().join("pipeline.db")).unwrap();
    let reconciler = Reconciler::new(&store);

    let first = reconciler.upsert(&detail).unwrap();
    assert!(first.created);
    assert_eq!(first.inspections_added, 2);

    let record = store.facilities.find_by_license("753201").unwrap().unwrap();
    assert_eq!(record.name, "Evergreen Care Home");
    assert_eq!(record.status, FacilityStatus::Active);
    assert_eq!(record.capacity, 5);
    assert_eq!(record.county, "Spokane");

    // A second pass over identical pages is a no-op apart from the
    // tracking refresh.
    let second = reconciler.upsert(&detail).unwrap();
    assert!(!second.created && !second.updated);
    assert_eq!(
        store.inspections.list_for_facility(&record.id).unwrap().len(),
        2
    );

    // The portal reports fewer beds next month: fingerprint moves, the
    // mutable fields follow.
    let mut changed = parse_facility_detail(&stub.license_number, DETAIL_PAGE);
    changed.capacity = 4;
    merge_documents_page(&mut changed, parse_inspection_documents(DOCUMENTS_PAGE));
    let third = reconciler.upsert(&changed).unwrap();
    assert!(third.updated);
    assert_eq!(
        store
            .facilities
            .find_by_license("753201")
            .unwrap()
            .unwrap()
            .capacity,
        4
    );
}
