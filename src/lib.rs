//! Exception-window scheduling and service drift for container clusters.
//!
//! - [`schedule`] owns the persisted exception windows.
//! - [`status`] derives remaining days and severity from a window.
//! - [`selection`] is the two-click calendar used to draft a window.
//! - [`drift`] groups a sync payload's service changes by cluster.
//! - [`inventory`] and [`filter`] back the cluster listing.
//! - [`progress`] carries the pollable saving/refreshing flags.

pub mod config;
pub mod db;
pub mod drift;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod models;
pub mod progress;
pub mod report;
pub mod schedule;
pub mod selection;
pub mod status;
