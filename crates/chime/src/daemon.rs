//! Daemon command: wire the engine together and run until interrupted.

use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use tracing::info;

use chime_scheduler::clock::SystemClock;
use chime_scheduler::{CallableRegistry, Engine, JobRequest};
use chime_table::MemoryJobTable;

/// Run the scheduling daemon.
///
/// Job functions are registered here by dotted path; a deployment wanting
/// real work replaces the demo registrations and plugs its own `JobTable`
/// implementation in place of the in-memory one.
pub async fn run(heartbeat_cron: Option<String>) -> Result<()> {
    let mut callables = CallableRegistry::new();
    callables.register("tasks.heartbeat.beat", |args, _kwargs| async move {
        info!(?args, "heartbeat");
        Ok(())
    });

    let engine = Engine::new(Arc::new(callables), Arc::new(SystemClock));
    let report = engine.init(Arc::new(MemoryJobTable::new())).await;
    info!(restarted = report.restarted, "daemon started");

    if let Some(cron_expression) = heartbeat_cron {
        let outcome = engine
            .registry()
            .create_unstored(JobRequest {
                job_id: Some("heartbeat".to_string()),
                job_name: "heartbeat".to_string(),
                func_name: "tasks.heartbeat.beat".to_string(),
                cron_expression: Some(cron_expression),
                ..JobRequest::default()
            })
            .await
            .map_err(|e| miette::miette!("{}", e))?;
        info!(id = outcome.id(), "scheduled heartbeat job");
    }

    tokio::signal::ctrl_c().await.into_diagnostic()?;
    info!("interrupt received, shutting down");
    engine.shutdown().await;
    Ok(())
}
