use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// An exception window placed on one resource. Both ends are calendar days and
/// `to` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub resource_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_days: i64,
    pub remaining_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleStatus {
    pub remaining_days: i64,
    pub total_days: i64,
    pub severity: Severity,
}

impl ScheduleStatus {
    /// Fraction of the window still ahead, clamped to `0.0..=1.0`.
    pub fn remaining_ratio(&self) -> f64 {
        if self.total_days <= 0 {
            return 0.0;
        }
        (self.remaining_days as f64 / self.total_days as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingCounts {
    pub min: i64,
    pub desired: i64,
    pub max: i64,
}

impl ScalingCounts {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.min <= self.desired && self.desired <= self.max {
            Ok(())
        } else {
            Err(SchedulerError::InvalidScaling {
                min: self.min,
                desired: self.desired,
                max: self.max,
            })
        }
    }

    /// Human readable list of the fields that differ, e.g. `desired 2 -> 4`.
    pub fn describe_change(&self, new: &ScalingCounts) -> Vec<String> {
        let mut changes = Vec::new();
        for (label, old_value, new_value) in [
            ("min", self.min, new.min),
            ("desired", self.desired, new.desired),
            ("max", self.max, new.max),
        ] {
            if old_value != new_value {
                changes.push(format!("{label} {old_value} -> {new_value}"));
            }
        }
        changes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceChangeRecord {
    pub id: String,
    pub name: String,
    pub cluster_name: String,
    pub kind: ChangeKind,
    pub old_counts: Option<ScalingCounts>,
    pub new_counts: Option<ScalingCounts>,
}

/// One element of the sync payload, before it is tagged with its change kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftEntry {
    /// String or number, as the sync collaborator sends it.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub name: String,
    pub cluster_name: String,
    #[serde(default)]
    pub old_values: Option<ScalingCounts>,
    #[serde(default)]
    pub new_values: Option<ScalingCounts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriftInput {
    #[serde(default)]
    pub added: Vec<DriftEntry>,
    #[serde(default)]
    pub updated: Vec<DriftEntry>,
    #[serde(default)]
    pub deleted: Vec<DriftEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDrift {
    pub cluster_name: String,
    pub added: Vec<ServiceChangeRecord>,
    pub updated: Vec<ServiceChangeRecord>,
    pub deleted: Vec<ServiceChangeRecord>,
    pub added_count: usize,
    pub updated_count: usize,
    pub deleted_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub clusters: Vec<ClusterDrift>,
    pub total_added: usize,
    pub total_updated: usize,
    pub total_deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComputeType {
    Fargate,
    Asg,
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fargate => write!(f, "FARGATE"),
            Self::Asg => write!(f, "ASG"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub name: String,
    pub active_services: i64,
    pub running_services: i64,
    pub closed_services: i64,
    pub compute_type: ComputeType,
}

/// Cached inventory as it is persisted: `{data, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub data: Vec<ClusterRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySummary {
    pub cluster_count: usize,
    pub total_services: i64,
    pub exception_count: usize,
}
