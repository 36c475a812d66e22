//! Error types for the alert scheduler.

use thiserror::Error;

use crate::db::DbError;

/// Errors surfaced by scheduler operations.
///
/// Projection functions never fail; everything here concerns the stateful
/// side: persistence, schedule validation, and run coordination.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("invalid scheduled time {0:?}, expected HH:MM (24-hour)")]
    InvalidScheduledTime(String),

    #[error("invalid days of week {0:?}, expected comma-separated 0-6 (0=Sunday)")]
    InvalidDaysOfWeek(String),

    #[error("a dispatch run is already in progress")]
    JobAlreadyRunning,

    #[error("no pending alert with id {0}")]
    AlertNotFound(i64),
}
