//! Startup reconciliation.
//!
//! Triggers live only in memory, so immediately after a restart every
//! durable record claiming `Active` is wrong — nothing is scheduled yet.
//! Reconciliation runs once, before the engine accepts traffic:
//!
//! 1. pause-sync: flip every `Active` durable record to `Paused` in one
//!    bulk update, so durable status reflects the empty store;
//! 2. auto-restart: re-admit every `active = true` record with a grace
//!    window, then commit the successfully re-admitted batch back as
//!    `Active`.
//!
//! Every step is best-effort. A scheduler that refuses to boot because of
//! one bad durable record is worse than one that boots with a job missing.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use chime_table::{DurableJobRecord, JobFilter, JobTable, JobUpdate, RunStatus};

use crate::clock::Clock;
use crate::registry::{CreateOutcome, JobRegistry};
use crate::types::JobRequest;

/// Grace window before any re-admitted job may fire after a restart.
const RESTART_GRACE_SECS: i64 = 60;

/// What reconciliation did, for the boot log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Durable records flipped from Active to Paused in pause-sync.
    pub paused: usize,
    /// Jobs re-admitted to the trigger store.
    pub restarted: usize,
    /// Jobs skipped because a trigger already existed.
    pub skipped: usize,
    /// Jobs that failed to re-admit.
    pub failed: usize,
}

/// One-shot startup reconciler.
pub struct Reconciler {
    registry: Arc<JobRegistry>,
    table: Arc<dyn JobTable>,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(registry: Arc<JobRegistry>, table: Arc<dyn JobTable>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            table,
            clock,
        }
    }

    /// Run both phases to completion and report.
    pub async fn run(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        self.pause_sync(&mut report).await;
        self.auto_restart(&mut report).await;
        info!(
            paused = report.paused,
            restarted = report.restarted,
            skipped = report.skipped,
            failed = report.failed,
            "reconciliation complete"
        );
        report
    }

    /// Flip every durable `Active` record to `Paused` in one transaction.
    async fn pause_sync(&self, report: &mut ReconcileReport) {
        let result = self
            .table
            .bulk_update(
                &JobFilter::with_status(RunStatus::Active),
                &JobUpdate::set_status(RunStatus::Paused),
            )
            .await;

        match result {
            Ok(0) => info!("no active durable records, pause-sync is a no-op"),
            Ok(count) => {
                info!(count, "paused stale durable records");
                report.paused = count;
            }
            Err(error) => warn!(%error, "pause-sync failed, continuing"),
        }
    }

    /// Re-admit every enabled job, then commit the batch as one write.
    async fn auto_restart(&self, report: &mut ReconcileReport) {
        let records = match self.table.query(&JobFilter::with_active(true)).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "auto-restart query failed, continuing");
                return;
            }
        };

        let floor = self.clock.now() + Duration::seconds(RESTART_GRACE_SECS);
        let mut batch: Vec<DurableJobRecord> = Vec::new();

        for mut record in records {
            if self.registry.get(&record.job_id).await.is_some() {
                info!(id = %record.job_id, "trigger already present, skipping");
                report.skipped += 1;
                continue;
            }

            let next_run = match record.next_run {
                Some(stored) if stored > floor => stored,
                _ => floor,
            };

            let request = JobRequest {
                job_id: Some(record.job_id.clone()),
                job_name: record.job_name.clone(),
                func_name: record.func_name.clone(),
                func_args: None,
                cron_expression: record.cron_expression.clone(),
                next_run: Some(next_run.format("%Y-%m-%d %H:%M:%S").to_string()),
                coalesce: false,
            };

            match self.registry.create_unstored(request).await {
                Ok(CreateOutcome::Created { id }) => {
                    info!(%id, %next_run, "re-admitted job after restart");
                    record.status = RunStatus::Active;
                    record.next_run = Some(next_run);
                    batch.push(record);
                    report.restarted += 1;
                }
                Ok(CreateOutcome::AlreadyExists { id }) => {
                    info!(%id, "trigger appeared concurrently, skipping");
                    report.skipped += 1;
                }
                Err(error) => {
                    // One bad job must not block the rest.
                    warn!(id = %record.job_id, %error, "failed to re-admit job, skipping");
                    report.failed += 1;
                }
            }
        }

        if !batch.is_empty()
            && let Err(error) = self.table.commit(&batch).await
        {
            warn!(%error, "failed to commit re-admitted batch");
        }
    }
}
