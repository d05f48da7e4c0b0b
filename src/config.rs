use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment-driven settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. When unset, blobs are kept as JSON files in `state_dir`.
    pub database_url: Option<String>,

    pub state_dir: PathBuf,

    pub max_connections: u32,

    /// Used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let state_dir = std::env::var("ECS_SCHEDULER_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".ecs-scheduler"));

        let max_connections: u32 = std::env::var("ECS_SCHEDULER_MAX_CONNECTIONS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("ECS_SCHEDULER_MAX_CONNECTIONS must be a positive integer.")?
            .unwrap_or(5)
            .max(1);

        let log_level =
            std::env::var("ECS_SCHEDULER_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());

        Ok(Self {
            database_url,
            state_dir,
            max_connections,
            log_level,
        })
    }
}
