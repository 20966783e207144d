//! Durable job table contract.
//!
//! The scheduler keeps its triggers purely in memory; the job table is the
//! persistent record of which jobs exist and whether they should be running.
//! The table itself (schema, migrations, SQL) lives outside this workspace —
//! this crate only defines the contract the reconciler depends on, plus an
//! in-memory implementation for tests and the demo daemon.

mod memory;

pub use memory::MemoryJobTable;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a job table backend.
#[derive(Debug, Error)]
pub enum TableError {
    /// The backend could not be reached or refused the query.
    #[error("job table unavailable: {0}")]
    Unavailable(String),

    /// A batch commit was rejected; previously committed state is intact.
    #[error("job table commit failed: {0}")]
    CommitFailed(String),
}

/// Durable run status of a job.
///
/// This is the source of truth for "should this job be running after a
/// restart". It is distinct from the `active` enable flag and from the
/// transient paused state of an in-memory trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not currently scheduled (0 in the legacy column encoding).
    Paused,
    /// A live trigger should exist for this job (1 in the legacy encoding).
    Active,
}

impl RunStatus {
    /// Legacy integer encoding used by the durable column.
    pub fn as_i64(self) -> i64 {
        match self {
            RunStatus::Paused => 0,
            RunStatus::Active => 1,
        }
    }
}

/// One row of the durable job table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableJobRecord {
    /// Unique job identifier; matches the in-memory trigger id.
    pub job_id: String,
    /// Human-readable job name.
    pub job_name: String,
    /// Dotted path of the function this job invokes.
    pub func_name: String,
    /// Six-field cron expression, if the job is cron-scheduled.
    pub cron_expression: Option<String>,
    /// When the job should next run.
    pub next_run: Option<DateTime<Utc>>,
    /// Durable run status.
    pub status: RunStatus,
    /// Persistent enable flag, independent of `status`.
    pub active: bool,
}

/// Row filter for queries and bulk updates. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub status: Option<RunStatus>,
    pub active: Option<bool>,
}

impl JobFilter {
    /// Match rows with the given durable status.
    pub fn with_status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Match rows with the given enable flag.
    pub fn with_active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Self::default()
        }
    }

    /// Whether a record passes this filter.
    pub fn matches(&self, record: &DurableJobRecord) -> bool {
        self.status.is_none_or(|s| record.status == s)
            && self.active.is_none_or(|a| record.active == a)
    }
}

/// Field update applied by `bulk_update`. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobUpdate {
    pub status: Option<RunStatus>,
    pub next_run: Option<DateTime<Utc>>,
}

impl JobUpdate {
    /// Set only the durable status.
    pub fn set_status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Abstract job table.
///
/// `bulk_update` is transactional on its own: either every matched row is
/// updated or none are. `commit` writes a batch of full records
/// all-or-nothing; a failed commit must not corrupt rows committed earlier.
#[async_trait]
pub trait JobTable: Send + Sync {
    /// Return all records matching the filter.
    async fn query(&self, filter: &JobFilter) -> Result<Vec<DurableJobRecord>, TableError>;

    /// Apply `update` to every record matching `filter`; returns the number
    /// of rows touched.
    async fn bulk_update(&self, filter: &JobFilter, update: &JobUpdate)
    -> Result<usize, TableError>;

    /// Write back a batch of records keyed by `job_id`, as one transaction.
    async fn commit(&self, records: &[DurableJobRecord]) -> Result<(), TableError>;
}
