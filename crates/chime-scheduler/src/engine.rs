//! Engine lifecycle.
//!
//! One `Engine` per process, constructed explicitly and passed around by
//! handle — there is no global scheduler. `init` reconciles against the
//! durable table and only then starts the fire clock, so no external
//! scheduling traffic can interleave with reconciliation.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::info;

use chime_table::JobTable;

use crate::clock::Clock;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registry::JobRegistry;
use crate::resolver::CallableResolver;
use crate::store::TriggerStore;

/// Process-scoped scheduling engine.
pub struct Engine {
    store: Arc<TriggerStore>,
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    clock_task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Assemble an engine. Nothing runs until [`Engine::init`].
    pub fn new(resolver: Arc<dyn CallableResolver>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(TriggerStore::new(resolver, Arc::clone(&clock)));
        let registry = Arc::new(JobRegistry::new(Arc::clone(&store), Arc::clone(&clock)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            registry,
            clock,
            shutdown_tx,
            shutdown_rx,
            clock_task: Mutex::new(None),
        }
    }

    /// Reconcile against the durable table, then start the fire clock.
    ///
    /// Must complete before the registry is exposed to external callers.
    pub async fn init(&self, table: Arc<dyn JobTable>) -> ReconcileReport {
        let reconciler = Reconciler::new(
            Arc::clone(&self.registry),
            table,
            Arc::clone(&self.clock),
        );
        let report = reconciler.run().await;

        let store = Arc::clone(&self.store);
        let shutdown_rx = self.shutdown_rx.clone();
        let task = tokio::spawn(store.run(shutdown_rx));
        *self.clock_task.lock().await = Some(task);

        info!("engine initialized, accepting scheduling traffic");
        report
    }

    /// The CRUD surface for callers.
    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// Stop the fire clock and wait for it to exit. In-flight job bodies
    /// are not cancelled; only future fires stop.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.clock_task.lock().await.take() {
            let _ = task.await;
        }
        info!("engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::resolver::CallableRegistry;
    use chime_table::MemoryJobTable;

    #[tokio::test]
    async fn init_then_shutdown_is_clean() {
        let engine = Engine::new(
            Arc::new(CallableRegistry::new()),
            Arc::new(SystemClock),
        );
        let report = engine.init(Arc::new(MemoryJobTable::new())).await;
        assert_eq!(report.restarted, 0);
        engine.shutdown().await;
    }
}
