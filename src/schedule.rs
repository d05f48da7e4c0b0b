//! Keyed store of exception windows.
//!
//! The whole mapping is persisted as a single JSON blob under
//! [`SCHEDULES_KEY`]. A write re-reads that blob and changes only the named
//! resource, so writers on different resources never erase each other; two
//! writers racing on the same resource resolve as last-write-wins.
//!
//! [`ScheduleStore`] is a handle: clones share one in-memory map.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::db::BlobStore;
use crate::error::SchedulerResult;
use crate::models::ScheduleWindow;

pub const SCHEDULES_KEY: &str = "ecs_cluster_schedules";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWindow {
    from: String,
    to: String,
    remaining_days: i64,
    total_days: i64,
}

impl From<&ScheduleWindow> for StoredWindow {
    fn from(window: &ScheduleWindow) -> Self {
        Self {
            from: window.from.to_string(),
            to: window.to.to_string(),
            remaining_days: window.remaining_days,
            total_days: window.total_days,
        }
    }
}

/// Accepts `2024-01-01` as well as full RFC 3339 timestamps, which are read as
/// the calendar day on the local clock.
fn parse_stored_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Local).date_naive())
}

fn decode_window(resource_id: &str, raw: serde_json::Value) -> Result<ScheduleWindow, String> {
    let stored: StoredWindow = serde_json::from_value(raw).map_err(|err| err.to_string())?;
    let from = parse_stored_date(&stored.from)
        .ok_or_else(|| format!("unparseable from date {:?}", stored.from))?;
    let to = parse_stored_date(&stored.to)
        .ok_or_else(|| format!("unparseable to date {:?}", stored.to))?;
    if from > to {
        return Err(format!("from {from} is after to {to}"));
    }
    Ok(ScheduleWindow {
        resource_id: resource_id.to_string(),
        from,
        to,
        total_days: stored.total_days,
        remaining_days: stored.remaining_days,
    })
}

fn decode_blob(blob: &str) -> BTreeMap<String, ScheduleWindow> {
    let entries: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(blob) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, "Discarding unreadable schedule blob");
            return BTreeMap::new();
        }
    };

    let mut windows = BTreeMap::new();
    for (resource_id, raw) in entries {
        match decode_window(&resource_id, raw) {
            Ok(window) => {
                windows.insert(resource_id, window);
            }
            Err(reason) => {
                warn!(resource_id = %resource_id, reason = %reason, "Discarding corrupt schedule record");
            }
        }
    }
    windows
}

fn encode_blob(windows: &BTreeMap<String, ScheduleWindow>) -> SchedulerResult<String> {
    let stored: BTreeMap<&str, StoredWindow> = windows
        .iter()
        .map(|(resource_id, window)| (resource_id.as_str(), StoredWindow::from(window)))
        .collect();
    Ok(serde_json::to_string(&stored)?)
}

/// Sole owner and writer of every [`ScheduleWindow`].
#[derive(Debug)]
pub struct ScheduleStore<B> {
    backend: Arc<B>,
    windows: Arc<RwLock<BTreeMap<String, ScheduleWindow>>>,
    // Serializes read-merge-save cycles across clones.
    writer: Arc<Mutex<()>>,
}

impl<B> Clone for ScheduleStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            windows: Arc::clone(&self.windows),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<B: BlobStore> ScheduleStore<B> {
    pub async fn open(backend: B) -> SchedulerResult<Self> {
        let windows = load_windows(&backend).await?;
        debug!(count = windows.len(), "Loaded schedule windows");
        Ok(Self {
            backend: Arc::new(backend),
            windows: Arc::new(RwLock::new(windows)),
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn get(&self, resource_id: &str) -> Option<ScheduleWindow> {
        self.read().get(resource_id).cloned()
    }

    pub fn list_all(&self) -> BTreeMap<String, ScheduleWindow> {
        self.read().clone()
    }

    /// Replaces the in-memory map with what is persisted now, picking up
    /// writes made by other processes.
    pub async fn reload(&self) -> SchedulerResult<()> {
        let _writer = self.writer.lock().await;
        let windows = load_windows(self.backend.as_ref()).await?;
        self.replace(windows);
        Ok(())
    }

    pub async fn put(&self, resource_id: &str, mut window: ScheduleWindow) -> SchedulerResult<()> {
        window.resource_id = resource_id.to_string();
        let _writer = self.writer.lock().await;
        let mut next = load_windows(self.backend.as_ref()).await?;
        next.insert(resource_id.to_string(), window);
        self.persist(next).await
    }

    pub async fn remove(&self, resource_id: &str) -> SchedulerResult<Option<ScheduleWindow>> {
        let _writer = self.writer.lock().await;
        let mut next = load_windows(self.backend.as_ref()).await?;
        let removed = next.remove(resource_id);
        if removed.is_some() {
            self.persist(next).await?;
        } else {
            self.replace(next);
        }
        Ok(removed)
    }

    async fn persist(&self, next: BTreeMap<String, ScheduleWindow>) -> SchedulerResult<()> {
        let blob = encode_blob(&next)?;
        self.backend.save(SCHEDULES_KEY, &blob).await?;
        self.replace(next);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ScheduleWindow>> {
        self.windows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, next: BTreeMap<String, ScheduleWindow>) {
        *self.windows.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

async fn load_windows<B: BlobStore>(backend: &B) -> SchedulerResult<BTreeMap<String, ScheduleWindow>> {
    Ok(match backend.load(SCHEDULES_KEY).await? {
        Some(blob) => decode_blob(&blob),
        None => BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FileBlobStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_window() -> ScheduleWindow {
        ScheduleWindow {
            resource_id: "analytics-cluster".to_string(),
            from: date(2024, 1, 1),
            to: date(2024, 1, 8),
            total_days: 7,
            remaining_days: 7,
        }
    }

    #[tokio::test]
    async fn put_is_visible_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        store.put("analytics-cluster", sample_window()).await.unwrap();
        assert_eq!(store.get("analytics-cluster"), Some(sample_window()));

        let reopened = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        assert_eq!(reopened.get("analytics-cluster"), Some(sample_window()));
        assert_eq!(reopened.list_all().len(), 1);
    }

    #[tokio::test]
    async fn later_put_replaces_earlier_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        store.put("analytics-cluster", sample_window()).await.unwrap();

        let replacement = ScheduleWindow {
            from: date(2024, 2, 1),
            to: date(2024, 2, 3),
            total_days: 2,
            remaining_days: 2,
            ..sample_window()
        };
        store
            .put("analytics-cluster", replacement.clone())
            .await
            .unwrap();
        assert_eq!(store.get("analytics-cluster"), Some(replacement));
        assert_eq!(store.list_all().len(), 1);
    }

    #[tokio::test]
    async fn remove_deletes_only_the_named_resource() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        store.put("analytics-cluster", sample_window()).await.unwrap();
        store.put("staging-cluster", sample_window()).await.unwrap();

        let removed = store.remove("analytics-cluster").await.unwrap();
        assert!(removed.is_some());
        assert!(store.remove("analytics-cluster").await.unwrap().is_none());

        let reopened = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        assert!(reopened.get("analytics-cluster").is_none());
        assert_eq!(
            reopened.get("staging-cluster").map(|w| w.resource_id),
            Some("staging-cluster".to_string())
        );
    }

    #[tokio::test]
    async fn corrupt_records_are_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBlobStore::new(dir.path());
        backend
            .save(
                SCHEDULES_KEY,
                r#"{
                    "good": {"from": "2024-01-01", "to": "2024-01-08", "remainingDays": 7, "totalDays": 7},
                    "stamped": {"from": "2024-01-01T12:00:00.000Z", "to": "2024-01-03T12:00:00.000Z", "remainingDays": 2, "totalDays": 2},
                    "bad-date": {"from": "yesterday", "to": "2024-01-08", "remainingDays": 7, "totalDays": 7},
                    "missing": {"from": "2024-01-01"},
                    "inverted": {"from": "2024-02-01", "to": "2024-01-01", "remainingDays": 0, "totalDays": 0}
                }"#,
            )
            .await
            .unwrap();

        let store = ScheduleStore::open(backend).await.unwrap();
        let ids: Vec<String> = store.list_all().into_keys().collect();
        assert_eq!(ids, vec!["good", "stamped"]);

        let stamped_day = DateTime::parse_from_rfc3339("2024-01-01T12:00:00.000Z")
            .unwrap()
            .with_timezone(&Local)
            .date_naive();
        assert_eq!(store.get("stamped").map(|w| w.from), Some(stamped_day));
    }

    #[tokio::test]
    async fn unreadable_blob_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBlobStore::new(dir.path());
        backend.save(SCHEDULES_KEY, "not json").await.unwrap();

        let store = ScheduleStore::open(backend).await.unwrap();
        assert!(store.list_all().is_empty());
    }

    #[tokio::test]
    async fn handles_opened_separately_keep_each_others_windows() {
        let dir = tempfile::tempdir().unwrap();
        let first = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        let second = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();

        let cluster_a = ScheduleWindow {
            resource_id: "cluster-a".to_string(),
            ..sample_window()
        };
        let cluster_b = ScheduleWindow {
            resource_id: "cluster-b".to_string(),
            ..sample_window()
        };
        first.put("cluster-a", cluster_a.clone()).await.unwrap();
        second.put("cluster-b", cluster_b.clone()).await.unwrap();
        assert_eq!(second.get("cluster-a"), Some(cluster_a.clone()));

        first.reload().await.unwrap();
        assert_eq!(first.get("cluster-b"), Some(cluster_b));

        let reopened = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        let ids: Vec<String> = reopened.list_all().into_keys().collect();
        assert_eq!(ids, vec!["cluster-a", "cluster-b"]);

        second.remove("cluster-b").await.unwrap();
        let reopened = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        assert_eq!(reopened.get("cluster-a"), Some(cluster_a));
    }

    #[tokio::test]
    async fn clones_see_each_mutation_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::open(FileBlobStore::new(dir.path()))
            .await
            .unwrap();
        let listing = store.clone();

        store.put("analytics-cluster", sample_window()).await.unwrap();
        assert_eq!(listing.get("analytics-cluster"), Some(sample_window()));

        listing.remove("analytics-cluster").await.unwrap();
        assert!(store.list_all().is_empty());
    }
}
