//! Scheduler types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cron::CronSchedule;

/// A unit of scheduled work, fully normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique trigger id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Dotted path of the function to invoke.
    pub callable: String,
    /// Positional arguments passed to the callable.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments passed to the callable.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Recurrence schedule. Absent means fully unconstrained.
    pub cron: Option<CronSchedule>,
    /// Desired first fire time. Absent lets the schedule decide.
    pub next_run: Option<DateTime<Utc>>,
    /// Collapse missed occurrences into a single catch-up fire on resume.
    #[serde(default)]
    pub coalesce: bool,
}

impl JobDefinition {
    /// Minimal definition for a named callable; everything else defaulted.
    pub fn new(id: impl Into<String>, callable: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            callable: callable.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            cron: None,
            next_run: None,
            coalesce: false,
        }
    }
}

/// A job creation request as received from external callers, before the
/// registry normalizes it: timestamps and arguments still in their encoded
/// string forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    /// Optional id; defaults to `name` when absent or empty.
    pub job_id: Option<String>,
    pub job_name: String,
    /// Dotted callable path.
    pub func_name: String,
    /// JSON-encoded positional arguments.
    pub func_args: Option<String>,
    /// Six-field cron expression.
    pub cron_expression: Option<String>,
    /// Desired first run, `%Y-%m-%d %H:%M:%S` or `%Y-%m-%dT%H:%M:%S.000Z`.
    pub next_run: Option<String>,
    #[serde(default)]
    pub coalesce: bool,
}

/// Run state of a trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// On the fire clock.
    #[default]
    Active,
    /// Definition retained, removed from the fire clock.
    Paused,
}

impl std::fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerStatus::Active => write!(f, "active"),
            TriggerStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Public view of a live trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEntry {
    pub definition: JobDefinition,
    /// Next computed fire time.
    pub next_fire: DateTime<Utc>,
    pub status: TriggerStatus,
}
