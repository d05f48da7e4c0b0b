use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::models::{ChangeKind, ClusterDrift, DriftEntry, DriftInput, DriftReport, ServiceChangeRecord};

#[derive(Default)]
struct Accumulator {
    added: Vec<ServiceChangeRecord>,
    updated: Vec<ServiceChangeRecord>,
    deleted: Vec<ServiceChangeRecord>,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Tags a sync entry with its change kind. Entries without an id get a fresh one.
///
/// Out-of-order scaling counts are reported but kept; records are shown as the
/// sync produced them.
pub fn into_record(entry: DriftEntry, kind: ChangeKind) -> ServiceChangeRecord {
    for counts in entry.old_values.iter().chain(entry.new_values.iter()) {
        if let Err(err) = counts.validate() {
            warn!(service = %entry.name, cluster = %entry.cluster_name, error = %err, "Sync reported inconsistent scaling counts");
        }
    }
    ServiceChangeRecord {
        id: match entry.id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        },
        name: entry.name,
        cluster_name: entry.cluster_name,
        kind,
        old_counts: entry.old_values,
        new_counts: entry.new_values,
    }
}

pub fn records_from_input(input: DriftInput) -> Vec<ServiceChangeRecord> {
    let DriftInput {
        added,
        updated,
        deleted,
    } = input;
    added
        .into_iter()
        .map(|entry| into_record(entry, ChangeKind::Added))
        .chain(updated.into_iter().map(|entry| into_record(entry, ChangeKind::Updated)))
        .chain(deleted.into_iter().map(|entry| into_record(entry, ChangeKind::Deleted)))
        .collect()
}

/// Groups change records by owning cluster, keeping input order inside each
/// sequence, and orders the groups by cluster name.
pub fn aggregate(records: &[ServiceChangeRecord]) -> DriftReport {
    let mut clusters: HashMap<&str, Accumulator> = HashMap::new();

    for record in records {
        let entry = clusters.entry(record.cluster_name.as_str()).or_default();
        match record.kind {
            ChangeKind::Added => entry.added.push(record.clone()),
            ChangeKind::Updated => entry.updated.push(record.clone()),
            ChangeKind::Deleted => entry.deleted.push(record.clone()),
        }
    }

    let mut groups: Vec<ClusterDrift> = clusters
        .into_iter()
        .filter(|(_, acc)| !acc.is_empty())
        .map(|(cluster_name, acc)| ClusterDrift {
            cluster_name: cluster_name.to_string(),
            added_count: acc.added.len(),
            updated_count: acc.updated.len(),
            deleted_count: acc.deleted.len(),
            added: acc.added,
            updated: acc.updated,
            deleted: acc.deleted,
        })
        .collect();
    groups.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));

    DriftReport {
        total_added: groups.iter().map(|g| g.added_count).sum(),
        total_updated: groups.iter().map(|g| g.updated_count).sum(),
        total_deleted: groups.iter().map(|g| g.deleted_count).sum(),
        clusters: groups,
    }
}

/// Keeps whole cluster groups whose name, or any of whose service names,
/// contains `query` case-insensitively. Totals are recomputed over what is kept.
pub fn filter_report(report: &DriftReport, query: &str) -> DriftReport {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return report.clone();
    }

    let clusters: Vec<ClusterDrift> = report
        .clusters
        .iter()
        .filter(|group| {
            group.cluster_name.to_lowercase().contains(&needle)
                || group
                    .added
                    .iter()
                    .chain(&group.updated)
                    .chain(&group.deleted)
                    .any(|record| record.name.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();

    DriftReport {
        total_added: clusters.iter().map(|g| g.added_count).sum(),
        total_updated: clusters.iter().map(|g| g.updated_count).sum(),
        total_deleted: clusters.iter().map(|g| g.deleted_count).sum(),
        clusters,
    }
}
