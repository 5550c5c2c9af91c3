//! Facility registry models.
//!
//! Records scraped from the DSHS lookup portal. Each facility detail carries
//! a content fingerprint over its field values, enabling change detection
//! between sync runs without a field-by-field diff.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Licensed capacity used when the portal value is missing or unparseable.
pub const DEFAULT_CAPACITY: u32 = 6;

/// Licensing status of a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityStatus {
    Active,
    Inactive,
}

impl FacilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Interpret the portal's free-text status field. Unknown text means
    /// Active: the portal only lists licensed homes, and blank status shows
    /// up on records that are otherwise current.
    pub fn parse_portal_text(s: &str) -> Self {
        let lowered = s.trim().to_lowercase();
        if lowered.contains("inactive") || lowered.contains("closed") {
            Self::Inactive
        } else {
            Self::Active
        }
    }
}

/// Minimal facility identity discovered from a county listing page.
///
/// Transient: produced by the list parse and consumed immediately by the
/// detail fetch. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilityStub {
    /// License number, the natural key across all stores.
    pub license_number: String,
    pub name: String,
    pub street: String,
    pub city: String,
    pub phone: String,
}

/// Document category inferred from an inspection link's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionKind {
    Inspection,
    Investigation,
    Enforcement,
    FollowUp,
}

impl InspectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspection => "inspection",
            Self::Investigation => "investigation",
            Self::Enforcement => "enforcement",
            Self::FollowUp => "follow_up",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inspection" => Some(Self::Inspection),
            "investigation" => Some(Self::Investigation),
            "enforcement" => Some(Self::Enforcement),
            "follow_up" => Some(Self::FollowUp),
            _ => None,
        }
    }

    /// Infer the kind from link text. Defaults to Inspection, the most
    /// common document class on the portal.
    pub fn infer(link_text: &str) -> Self {
        let lowered = link_text.to_lowercase();
        if lowered.contains("follow") {
            Self::FollowUp
        } else if lowered.contains("investigation") || lowered.contains("complaint") {
            Self::Investigation
        } else if lowered.contains("enforcement") {
            Self::Enforcement
        } else {
            Self::Inspection
        }
    }
}

/// One inspection document reference from the related-documents page.
///
/// The portal offers no stable identifier for individual rows, so these are
/// replaced wholesale on any detected change rather than diffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRecord {
    /// First of the document's effective month; None when unparseable.
    pub effective_date: Option<NaiveDate>,
    pub kind: InspectionKind,
    /// Always 0: the PDF contents are never parsed, and recording a guess
    /// would be false precision.
    pub violation_count: u32,
    /// Compliance/determination numbers scraped from the document filename.
    pub compliance_numbers: Vec<String>,
    /// Absolutized, space-escaped document URL.
    pub document_url: String,
}

impl InspectionRecord {
    fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(
            self.effective_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
        hasher.update([0x1f]);
        hasher.update(self.kind.as_str());
        hasher.update([0x1f]);
        hasher.update(self.violation_count.to_le_bytes());
        for number in &self.compliance_numbers {
            hasher.update(number);
            hasher.update([0x1f]);
        }
        hasher.update(&self.document_url);
        hasher.update([0x1e]);
    }
}

/// The full record for one facility, as captured from the detail and
/// related-documents pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityDetail {
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
    pub inspections: Vec<InspectionRecord>,
    pub captured_at: DateTime<Utc>,
    /// SHA-256 over all fields except the fingerprint itself and the
    /// capture timestamp (a re-fetch of unchanged content must hash
    /// identically). Recomputed whenever inspections are attached, since
    /// they arrive from a second page after the base record.
    pub fingerprint: String,
}

impl FacilityDetail {
    /// Create a detail record with portal defaults for every field.
    pub fn new(license_number: &str) -> Self {
        let mut detail = Self {
            license_number: license_number.to_string(),
            name: String::new(),
            status: FacilityStatus::Active,
            capacity: DEFAULT_CAPACITY,
            street: String::new(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            county: String::new(),
            phone: String::new(),
            inspections: Vec::new(),
            captured_at: Utc::now(),
            fingerprint: String::new(),
        };
        detail.refresh_fingerprint();
        detail
    }

    /// Compute the content fingerprint from the current field values.
    pub fn compute_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            &self.license_number,
            &self.name,
            &self.street,
            &self.city,
            &self.state,
            &self.zip,
            &self.county,
            &self.phone,
        ] {
            hasher.update(field);
            hasher.update([0x1f]);
        }
        hasher.update(self.status.as_str());
        hasher.update([0x1f]);
        hasher.update(self.capacity.to_le_bytes());
        hasher.update([0x1e]);
        for inspection in &self.inspections {
            inspection.hash_into(&mut hasher);
        }
        hex::encode(hasher.finalize())
    }

    /// Recompute and store the fingerprint.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = self.compute_fingerprint();
    }

    /// Attach the inspection list from the related-documents page and
    /// refresh the fingerprint to cover it.
    pub fn attach_inspections(&mut self, inspections: Vec<InspectionRecord>) {
        self.inspections = inspections;
        self.refresh_fingerprint();
    }
}
