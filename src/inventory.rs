//! Cluster inventory with stale-while-revalidate refresh.
//!
//! The last good snapshot is cached under [`INVENTORY_CACHE_KEY`] and shown
//! first; a failed refresh keeps it on screen and raises an error banner.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::db::BlobStore;
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::{ClusterRecord, InventorySnapshot, InventorySummary, ScheduleWindow};
use crate::progress::ProgressFlag;

pub const INVENTORY_CACHE_KEY: &str = "ecs_inventory_cache";

/// Age after which a cached snapshot is reported as old. It is still shown.
pub fn cache_max_age() -> Duration {
    Duration::hours(24)
}

pub fn is_stale(snapshot: &InventorySnapshot, now: DateTime<Utc>) -> bool {
    now - snapshot.timestamp > cache_max_age()
}

#[allow(async_fn_in_trait)]
pub trait InventorySource {
    async fn fetch(&self) -> SchedulerResult<Vec<ClusterRecord>>;
}

/// Reads cluster rows from a CSV export with a header row matching
/// [`ClusterRecord`]'s field names.
#[derive(Debug, Clone)]
pub struct CsvInventorySource {
    path: PathBuf,
}

impl CsvInventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InventorySource for CsvInventorySource {
    async fn fetch(&self) -> SchedulerResult<Vec<ClusterRecord>> {
        let refresh_error =
            |err: csv::Error| SchedulerError::Refresh(format!("{}: {err}", self.path.display()));

        let mut reader = csv::Reader::from_path(&self.path).map_err(refresh_error)?;
        let mut clusters = Vec::new();
        for row in reader.deserialize::<ClusterRecord>() {
            clusters.push(row.map_err(refresh_error)?);
        }
        Ok(clusters)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    ServedStale,
    Skipped,
}

/// What a listing view shows: the current snapshot plus the banner state.
#[derive(Debug, Default)]
pub struct InventoryView {
    snapshot: Option<InventorySnapshot>,
    error: Option<String>,
    refreshing: ProgressFlag,
}

impl InventoryView {
    pub fn snapshot(&self) -> Option<&InventorySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn clusters(&self) -> &[ClusterRecord] {
        self.snapshot.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.is_set()
    }

    /// Handle on the refreshing flag that stays readable while a refresh runs.
    pub fn refreshing_flag(&self) -> ProgressFlag {
        self.refreshing.clone()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Puts the cached snapshot on display, whatever its age.
    pub async fn load_cached<B: BlobStore>(&mut self, backend: &B, now: DateTime<Utc>) {
        let blob = match backend.load(INVENTORY_CACHE_KEY).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "Could not read inventory cache");
                return;
            }
        };
        match serde_json::from_str::<InventorySnapshot>(&blob) {
            Ok(snapshot) => {
                if is_stale(&snapshot, now) {
                    info!(cached_at = %snapshot.timestamp, "Inventory cache is old; showing it until refresh completes");
                }
                self.snapshot = Some(snapshot);
            }
            Err(err) => warn!(error = %err, "Discarding corrupt inventory cache"),
        }
    }

    /// Shows the cache (if nothing is displayed yet) and then tries `source`.
    ///
    /// On failure the displayed snapshot is left as it was and the error is kept
    /// for the banner. Retrying is up to the caller. Dropping the future before
    /// it completes keeps the displayed snapshot and lowers the refreshing flag.
    pub async fn refresh<B, S>(&mut self, backend: &B, source: &S, now: DateTime<Utc>) -> RefreshOutcome
    where
        B: BlobStore,
        S: InventorySource,
    {
        let Some(_refreshing) = self.refreshing.begin() else {
            debug!("Refresh already in progress");
            return RefreshOutcome::Skipped;
        };
        if self.snapshot.is_none() {
            self.load_cached(backend, now).await;
        }

        let fetched = source.fetch().await;

        match fetched {
            Ok(data) => {
                let snapshot = InventorySnapshot {
                    data,
                    timestamp: now,
                };
                match serde_json::to_string(&snapshot) {
                    Ok(blob) => {
                        if let Err(err) = backend.save(INVENTORY_CACHE_KEY, &blob).await {
                            warn!(error = %err, "Could not write inventory cache");
                        }
                    }
                    Err(err) => warn!(error = %err, "Could not encode inventory cache"),
                }
                debug!(clusters = snapshot.data.len(), "Inventory refreshed");
                self.snapshot = Some(snapshot);
                self.error = None;
                RefreshOutcome::Updated
            }
            Err(err) => {
                warn!(error = %err, has_cached = self.snapshot.is_some(), "Inventory refresh failed");
                self.error = Some(err.to_string());
                RefreshOutcome::ServedStale
            }
        }
    }
}

/// Header totals for the cluster listing. A cluster counts as under exception
/// while it has a stored window that has not yet ended.
pub fn summarize(
    clusters: &[ClusterRecord],
    schedules: &BTreeMap<String, ScheduleWindow>,
    today: NaiveDate,
) -> InventorySummary {
    InventorySummary {
        cluster_count: clusters.len(),
        total_services: clusters.iter().map(|c| c.active_services).sum(),
        exception_count: clusters
            .iter()
            .filter(|c| schedules.get(&c.name).is_some_and(|w| w.to >= today))
            .count(),
    }
}
