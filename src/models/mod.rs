//! Data models for the registry sync pipeline.

mod facility;
mod sync_run;

pub use facility::{
    FacilityDetail, FacilityStatus, FacilityStub, InspectionKind, InspectionRecord,
    DEFAULT_CAPACITY,
};
pub use sync_run::{SyncCounters, SyncRunRecord, SyncRunStatus, SyncRunType, SyncTrackingRecord};
