//! Cron-driven job scheduling engine.
//!
//! This crate provides a single-process scheduler that:
//! - Translates six-field cron expressions into structured schedules
//! - Keeps live triggers in an in-memory store with a fire clock
//! - Layers CRUD business rules (id defaulting, next-run clamping,
//!   argument decoding) over the store
//! - Reconciles durable job status against the freshly-booted, empty
//!   trigger store on startup

pub mod clock;
mod cron;
mod engine;
mod error;
mod reconcile;
mod registry;
mod resolver;
mod store;
mod types;

pub use cron::{CRON_FIELD_COUNT, CronSchedule, validate};
pub use engine::Engine;
pub use error::SchedulerError;
pub use reconcile::{ReconcileReport, Reconciler};
pub use registry::{CreateOutcome, JobRegistry, MIN_SCHEDULE_LEAD_SECS};
pub use resolver::{Callable, CallableRegistry, CallableResolver, JobFuture};
pub use store::TriggerStore;
pub use types::{JobDefinition, JobRequest, TriggerEntry, TriggerStatus};
