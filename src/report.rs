use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::inventory::InventoryView;
use crate::models::{
    ClusterRecord, DriftReport, InventorySummary, ScheduleStatus, ScheduleWindow,
    ServiceChangeRecord,
};
use crate::status;

const GAUGE_WIDTH: usize = 10;

/// Text rendition of the countdown ring: the filled share is the part of the
/// window still remaining.
pub fn gauge(status: &ScheduleStatus) -> String {
    let filled = (status.remaining_ratio() * GAUGE_WIDTH as f64).round() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(GAUGE_WIDTH - filled.min(GAUGE_WIDTH))
    )
}

fn window_line(window: &ScheduleWindow, today: NaiveDate) -> String {
    let status = status::status(window, today);
    format!(
        "{} {} {} -> {} ({} of {} days left, {})",
        window.resource_id,
        gauge(&status),
        window.from,
        window.to,
        status.remaining_days,
        status.total_days,
        status.severity
    )
}

pub fn render_schedule(resource_id: &str, window: Option<&ScheduleWindow>, today: NaiveDate) -> String {
    match window {
        Some(window) => window_line(window, today),
        None => format!("{resource_id}: no exception window scheduled"),
    }
}

pub fn render_schedule_list(windows: &BTreeMap<String, ScheduleWindow>, today: NaiveDate) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Exception Windows");
    if windows.is_empty() {
        let _ = writeln!(output, "No exception windows scheduled.");
    } else {
        for window in windows.values() {
            let _ = writeln!(output, "- {}", window_line(window, today));
        }
    }
    output
}

fn change_line(record: &ServiceChangeRecord) -> String {
    match (record.old_counts, record.new_counts) {
        (Some(old), Some(new)) => {
            let changes = old.describe_change(&new);
            if changes.is_empty() {
                record.name.clone()
            } else {
                format!("{} ({})", record.name, changes.join(", "))
            }
        }
        _ => record.name.clone(),
    }
}

pub fn render_drift(report: &DriftReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Service Updates");
    let _ = writeln!(
        output,
        "Added {} / Updated {} / Deleted {}",
        report.total_added, report.total_updated, report.total_deleted
    );

    if report.clusters.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No drift detected for the selected filters.");
        return output;
    }

    for group in &report.clusters {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", group.cluster_name);
        for (title, records, empty) in [
            ("Added", &group.added, "No additions"),
            ("Updated", &group.updated, "No updates"),
            ("Deleted", &group.deleted, "No deletions"),
        ] {
            let _ = writeln!(output, "{title} ({}):", records.len());
            if records.is_empty() {
                let _ = writeln!(output, "  {empty}");
            }
            for record in records {
                let _ = writeln!(output, "  - {}", change_line(record));
            }
        }
    }
    output
}

pub fn render_inventory(
    view: &InventoryView,
    clusters: &[ClusterRecord],
    summary: &InventorySummary,
    schedules: &BTreeMap<String, ScheduleWindow>,
    today: NaiveDate,
) -> String {
    let mut output = String::new();
    if let Some(error) = view.error() {
        let _ = writeln!(output, "! Refresh failed: {error}");
        if view.snapshot().is_some() {
            let _ = writeln!(output, "! Showing last known inventory.");
        }
    }
    if let Some(snapshot) = view.snapshot() {
        let _ = writeln!(output, "Inventory as of {}", snapshot.timestamp.to_rfc3339());
    }
    let _ = writeln!(
        output,
        "{} clusters, {} services, {} under exception",
        summary.cluster_count, summary.total_services, summary.exception_count
    );

    for cluster in clusters {
        let schedule = schedules
            .get(&cluster.name)
            .map(|w| {
                let status = status::status(w, today);
                format!(" {} {}d", gauge(&status), status.remaining_days)
            })
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "- {} [{}] {}/{} running, {} closed{}",
            cluster.name,
            cluster.compute_type,
            cluster.running_services,
            cluster.active_services,
            cluster.closed_services,
            schedule
        );
    }
    output
}
