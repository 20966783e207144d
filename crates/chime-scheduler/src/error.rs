//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Cron expression did not have exactly six whitespace-separated fields.
    #[error("cron expression must have 6 fields, got {found}: '{expression}'")]
    CronFieldCount { expression: String, found: usize },

    /// Cron expression failed to compile into a schedule.
    #[error("invalid cron expression '{expression}': {source}")]
    CronParse {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    /// Cron schedule has no occurrence after the requested instant.
    #[error("cron expression '{0}' has no upcoming occurrence")]
    NoUpcomingFire(String),

    /// Callable path does not resolve to a registered function.
    #[error("callable not found: {0}")]
    CallableNotFound(String),

    /// Trigger already registered under this id.
    #[error("trigger already exists: {0}")]
    TriggerExists(String),

    /// No trigger registered under this id.
    #[error("trigger not found: {0}")]
    TriggerNotFound(String),
}
