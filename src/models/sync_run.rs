//! Sync run audit models.
//!
//! One `SyncRunRecord` is written per orchestrator invocation and updated
//! incrementally, so a crashed run still shows partial progress. The
//! `SyncTrackingRecord` holds the last fingerprint seen per license number
//! and decides whether a re-fetched facility actually changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunType {
    Full,
    SingleCounty,
}

impl SyncRunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SingleCounty => "single_county",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "single_county" => Some(Self::SingleCounty),
            _ => None,
        }
    }
}

/// Lifecycle state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Success,
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Running counters for a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    pub checked: u64,
    pub added: u64,
    pub updated: u64,
    pub inspections_added: u64,
}

/// One audit row per orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunRecord {
    /// Database row ID; 0 until inserted.
    pub id: i64,
    pub run_type: SyncRunType,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counters: SyncCounters,
    pub error_message: Option<String>,
}

impl SyncRunRecord {
    pub fn new(run_type: SyncRunType) -> Self {
        Self {
            id: 0,
            run_type,
            status: SyncRunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            counters: SyncCounters::default(),
            error_message: None,
        }
    }

    pub fn finish_success(&mut self, counters: SyncCounters) {
        self.status = SyncRunStatus::Success;
        self.counters = counters;
        self.finished_at = Some(Utc::now());
    }

    pub fn finish_failed(&mut self, counters: SyncCounters, error: &str) {
        self.status = SyncRunStatus::Failed;
        self.counters = counters;
        self.error_message = Some(error.to_string());
        self.finished_at = Some(Utc::now());
    }
}

/// Last fingerprint and last-synced timestamp per license number.
///
/// Upserted on every successful fetch regardless of whether the facility
/// record changed, so operators can distinguish "checked, unchanged" from
/// "never reached".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTrackingRecord {
    pub license_number: String,
    pub fingerprint: String,
    pub last_synced_at: DateTime<Utc>,
}
