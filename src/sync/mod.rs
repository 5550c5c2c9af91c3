//! Sync orchestration.
//!
//! One logical worker per run: the portal is stateful per-session and
//! rate-sensitive, so crawling is strictly sequential with fixed pacing
//! between facilities. Failures are recovered as locally as possible
//! (row, then facility, then county, then run) and the run itself always
//! completes with a terminal run record and a released session.

pub mod reconcile;

pub use reconcile::{Reconciler, UpsertOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::SyncSettings;
use crate::models::{SyncCounters, SyncRunRecord, SyncRunStatus, SyncRunType};
use crate::portal::urls::COUNTIES;
use crate::portal::{is_connection_lost, RegistryPortal};
use crate::repository::SyncStore;

/// Result returned to the scheduler. Always a value, never a propagated
/// error: the caller needs counters and a message to decide whether to
/// alert, not an exception.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub checked: u64,
    pub added: u64,
    pub updated: u64,
    pub inspections: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    fn from_counters(success: bool, counters: SyncCounters, error: Option<String>) -> Self {
        Self {
            success,
            checked: counters.checked,
            added: counters.added,
            updated: counters.updated,
            inspections: counters.inspections_added,
            error,
        }
    }
}

/// Registry sync service. Construct one at startup and hand it to the
/// scheduler; the only process-wide state is the run-active flag that
/// serializes overlapping invocations.
pub struct SyncService {
    store: SyncStore,
    settings: SyncSettings,
    run_active: AtomicBool,
}

impl SyncService {
    pub fn new(store: SyncStore, settings: SyncSettings) -> Self {
        Self {
            store,
            settings,
            run_active: AtomicBool::new(false),
        }
    }

    /// Sync every known county.
    pub async fn full_sync(&self, portal: &mut dyn RegistryPortal) -> SyncResult {
        self.run(portal, SyncRunType::Full, None).await
    }

    /// Sync a single county, with consecutive-failure circuit breaking and
    /// session recovery.
    pub async fn sync_single_county(
        &self,
        portal: &mut dyn RegistryPortal,
        county: &str,
    ) -> SyncResult {
        self.run(portal, SyncRunType::SingleCounty, Some(county)).await
    }

    async fn run(
        &self,
        portal: &mut dyn RegistryPortal,
        run_type: SyncRunType,
        county: Option<&str>,
    ) -> SyncResult {
        if self
            .run_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("refusing to start: a sync run is already active");
            return SyncResult::from_counters(
                false,
                SyncCounters::default(),
                Some("a sync run is already active".to_string()),
            );
        }

        let result = self.run_locked(portal, run_type, county).await;
        self.run_active.store(false, Ordering::SeqCst);
        result
    }

    async fn run_locked(
        &self,
        portal: &mut dyn RegistryPortal,
        run_type: SyncRunType,
        county: Option<&str>,
    ) -> SyncResult {
        let run_id = match self.store.runs.insert(&SyncRunRecord::new(run_type)) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "failed to insert sync run record");
                return SyncResult::from_counters(
                    false,
                    SyncCounters::default(),
                    Some(format!("failed to insert sync run record: {e}")),
                );
            }
        };
        info!(run_id, run_type = run_type.as_str(), "sync run started");

        let mut counters = SyncCounters::default();
        let outcome = self.run_inner(portal, run_id, county, &mut counters).await;

        // Session release happens on every path, including run failure.
        portal.release().await;

        match outcome {
            Ok(()) => {
                if let Err(e) = self
                    .store
                    .runs
                    .finalize(run_id, SyncRunStatus::Success, &counters, None)
                {
                    error!(run_id, error = %e, "failed to finalize sync run record");
                }
                info!(
                    run_id,
                    checked = counters.checked,
                    added = counters.added,
                    updated = counters.updated,
                    inspections = counters.inspections_added,
                    "sync run finished"
                );
                SyncResult::from_counters(true, counters, None)
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(run_id, error = %message, "sync run failed");
                if let Err(e) =
                    self.store
                        .runs
                        .finalize(run_id, SyncRunStatus::Failed, &counters, Some(&message))
                {
                    error!(run_id, error = %e, "failed to finalize sync run record");
                }
                SyncResult::from_counters(false, counters, Some(message))
            }
        }
    }

    async fn run_inner(
        &self,
        portal: &mut dyn RegistryPortal,
        run_id: i64,
        county: Option<&str>,
        counters: &mut SyncCounters,
    ) -> Result<()> {
        portal
            .connect()
            .await
            .context("failed to acquire browser session")?;

        match county {
            Some(county) => self.sync_county(portal, run_id, county, counters, true).await,
            None => {
                for county in COUNTIES.iter().copied() {
                    if let Err(e) = self.sync_county(portal, run_id, county, counters, false).await
                    {
                        // County-level isolation: log and move on.
                        warn!(county, error = format!("{e:#}"), "county sync failed");
                    }
                }
                Ok(())
            }
        }
    }

    /// Process one county's facilities sequentially. With `recover` set
    /// (single-county runs), lost browser connections trigger bounded
    /// session reinitialization and repeated failures trip the breaker
    /// instead of burning the remaining facilities against a dead session.
    async fn sync_county(
        &self,
        portal: &mut dyn RegistryPortal,
        run_id: i64,
        county: &str,
        counters: &mut SyncCounters,
        recover: bool,
    ) -> Result<()> {
        let stubs = portal.list_facilities(county).await?;
        info!(county, count = stubs.len(), "county listing complete");

        let pacing = Duration::from_millis(self.settings.request_delay_ms);
        let mut consecutive_failures = 0u32;

        for stub in &stubs {
            if recover && consecutive_failures >= self.settings.max_consecutive_failures {
                warn!(
                    county,
                    failures = consecutive_failures,
                    "consecutive-failure threshold reached; aborting county"
                );
                break;
            }

            counters.checked += 1;
            match self.sync_facility(portal, county, &stub.license_number).await {
                Ok(Some(outcome)) => {
                    consecutive_failures = 0;
                    if outcome.created {
                        counters.added += 1;
                    }
                    if outcome.updated {
                        counters.updated += 1;
                    }
                    counters.inspections_added += outcome.inspections_added;
                }
                Ok(None) => {
                    // Soft failure; the facility is retried on the next
                    // scheduled run, not within this one.
                    warn!(
                        county,
                        license = %stub.license_number,
                        "no detail returned; skipping facility"
                    );
                }
                Err(e) => {
                    if recover && is_connection_lost(&e) {
                        warn!(
                            county,
                            license = %stub.license_number,
                            error = format!("{e:#}"),
                            "browser connection lost; reinitializing session"
                        );
                        self.recover_session(portal).await?;
                        consecutive_failures = 0;
                    } else {
                        warn!(
                            county,
                            license = %stub.license_number,
                            error = format!("{e:#}"),
                            "facility sync failed; skipping"
                        );
                        consecutive_failures += 1;
                    }
                }
            }

            if let Err(e) = self.store.runs.update_progress(run_id, counters) {
                warn!(run_id, error = %e, "failed to update run progress");
            }
            tokio::time::sleep(pacing).await;
        }

        Ok(())
    }

    async fn sync_facility(
        &self,
        portal: &mut dyn RegistryPortal,
        county: &str,
        license_number: &str,
    ) -> Result<Option<UpsertOutcome>> {
        let Some(mut detail) = portal.fetch_facility_detail(license_number).await? else {
            return Ok(None);
        };

        // The detail page does not always carry the county; the listing
        // context does.
        if detail.county.is_empty() {
            detail.county = county.to_string();
            detail.refresh_fingerprint();
        }

        let outcome = Reconciler::new(&self.store).upsert(&detail)?;
        Ok(Some(outcome))
    }

    /// Bounded attempts to release and reacquire the browser session.
    async fn recover_session(&self, portal: &mut dyn RegistryPortal) -> Result<()> {
        let attempts = self.settings.session_reconnect_attempts.max(1);
        let mut last_error = anyhow!("no reconnect attempts configured");
        for attempt in 1..=attempts {
            match portal.reinitialize().await {
                Ok(()) => {
                    info!(attempt, "browser session reinitialized");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = format!("{e:#}"), "session reinitialization failed");
                    last_error = e;
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
        Err(last_error.context(format!(
            "failed to reinitialize browser session after {attempts} attempts"
        )))
    }
}
