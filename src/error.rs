use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("inventory refresh failed: {0}")]
    Refresh(String),

    #[error("cannot confirm a schedule before a start day is selected")]
    InvalidCommit,

    #[error("a schedule save is already in progress")]
    CommitInProgress,

    #[error("invalid scaling counts: min {min}, desired {desired}, max {max}")]
    InvalidScaling { min: i64, desired: i64, max: i64 },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
