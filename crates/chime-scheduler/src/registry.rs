//! Job registry: CRUD over the trigger store with the business rules
//! external callers rely on (id defaulting, next-run clamping, argument
//! decoding, soft duplicate handling).

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::cron::CronSchedule;
use crate::error::SchedulerError;
use crate::store::TriggerStore;
use crate::types::{JobDefinition, JobRequest, TriggerEntry, TriggerStatus};

/// A freshly created job never fires sooner than this, so downstream
/// systems have time to become consistent with the creation.
pub const MIN_SCHEDULE_LEAD_SECS: i64 = 30;

/// Accepted `next_run` timestamp formats.
const NEXT_RUN_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S.000Z"];

/// Result of a create call. A duplicate id is not a failure: the existing
/// id is handed back so callers can proceed idempotently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { id: String },
    AlreadyExists { id: String },
}

impl CreateOutcome {
    pub fn id(&self) -> &str {
        match self {
            CreateOutcome::Created { id } | CreateOutcome::AlreadyExists { id } => id,
        }
    }
}

/// Decoded positional arguments, keeping "nothing supplied" apart from
/// "supplied but malformed".
#[derive(Debug, PartialEq, Eq)]
enum DecodedArgs {
    Absent,
    Parsed(Vec<Value>),
    Malformed,
}

/// CRUD façade over the trigger store.
pub struct JobRegistry {
    store: Arc<TriggerStore>,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(store: Arc<TriggerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a trigger from an external request without touching the
    /// durable table (hence "unstored" — persistence is the caller's job).
    ///
    /// Normalization rules:
    /// - id defaults to the job name;
    /// - `next_run` accepts two timestamp formats and is clamped so the
    ///   effective first fire is at least 30 seconds away;
    /// - arguments arrive JSON-encoded; malformed input is logged and
    ///   falls back to a single-element list holding the job id.
    pub async fn create_unstored(&self, request: JobRequest) -> Result<CreateOutcome, SchedulerError> {
        let id = request
            .job_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| request.job_name.clone());

        let cron = CronSchedule::parse(request.cron_expression.as_deref())?;

        let floor = self.clock.now() + Duration::seconds(MIN_SCHEDULE_LEAD_SECS);
        let next_run = request
            .next_run
            .as_deref()
            .and_then(parse_next_run)
            .filter(|at| *at >= floor)
            .unwrap_or(floor);

        let args = match decode_args(request.func_args.as_deref()) {
            DecodedArgs::Absent => Vec::new(),
            DecodedArgs::Parsed(args) => args,
            DecodedArgs::Malformed => {
                warn!(id = %id, "job arguments are not a JSON array, falling back to [job_id]");
                vec![Value::String(id.clone())]
            }
        };

        if self.store.get(&id).await.is_some() {
            warn!(id = %id, "job already exists");
            return Ok(CreateOutcome::AlreadyExists { id });
        }

        let definition = JobDefinition {
            id: id.clone(),
            name: request.job_name,
            callable: request.func_name,
            args,
            kwargs: serde_json::Map::new(),
            cron: Some(cron),
            next_run: Some(next_run),
            coalesce: request.coalesce,
        };

        match self.store.add(definition).await {
            Ok(()) => {
                info!(id = %id, %next_run, "created job");
                Ok(CreateOutcome::Created { id })
            }
            // Lost a race with a concurrent create; same soft outcome.
            Err(SchedulerError::TriggerExists(id)) => Ok(CreateOutcome::AlreadyExists { id }),
            Err(e) => Err(e),
        }
    }

    /// Delete a job's trigger.
    pub async fn delete(&self, id: &str) -> Result<(), SchedulerError> {
        self.store.remove(id).await?;
        info!(id, "deleted job");
        Ok(())
    }

    /// Replace a job's definition, keeping its id.
    ///
    /// Implemented as delete-then-recreate and therefore not atomic: if the
    /// recreate step fails, the job is gone. Callers that need the old
    /// definition back on failure must snapshot it first.
    pub async fn modify(&self, request: JobRequest) -> Result<CreateOutcome, SchedulerError> {
        let id = request
            .job_id
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| request.job_name.clone());
        self.store.remove(&id).await?;
        self.create_unstored(request).await
    }

    /// Pause a job's trigger.
    pub async fn pause(&self, id: &str) -> Result<TriggerStatus, SchedulerError> {
        self.store.pause(id).await
    }

    /// Resume a paused trigger; see the store for the coalesce policy.
    pub async fn resume(&self, id: &str) -> Result<TriggerStatus, SchedulerError> {
        self.store.resume(id).await
    }

    /// Look up a job definition.
    pub async fn get(&self, id: &str) -> Option<JobDefinition> {
        self.store.get(id).await.map(|entry| entry.definition)
    }

    /// Look up the full trigger entry (definition plus fire state).
    pub async fn get_entry(&self, id: &str) -> Option<TriggerEntry> {
        self.store.get(id).await
    }

    /// All job definitions, ordered by next fire time.
    pub async fn list(&self) -> Vec<JobDefinition> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|entry| entry.definition)
            .collect()
    }
}

/// Parse a `next_run` timestamp in either accepted format.
fn parse_next_run(raw: &str) -> Option<DateTime<Utc>> {
    NEXT_RUN_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn decode_args(raw: Option<&str>) -> DecodedArgs {
    let Some(raw) = raw else {
        return DecodedArgs::Absent;
    };
    if raw.trim().is_empty() {
        return DecodedArgs::Absent;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(args)) => DecodedArgs::Parsed(args),
        // Valid JSON that is not an array is as unusable as a parse error.
        Ok(_) | Err(_) => DecodedArgs::Malformed,
    }
}
