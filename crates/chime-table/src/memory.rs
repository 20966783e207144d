//! In-memory job table.
//!
//! Backs tests and the demo daemon; a production deployment plugs its own
//! relational implementation into the [`JobTable`] trait instead.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{DurableJobRecord, JobFilter, JobTable, JobUpdate, TableError};

/// `JobTable` implementation over a mutex-guarded row vector.
#[derive(Default)]
pub struct MemoryJobTable {
    rows: Mutex<Vec<DurableJobRecord>>,
}

impl MemoryJobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with initial records.
    pub fn with_records(records: Vec<DurableJobRecord>) -> Self {
        Self {
            rows: Mutex::new(records),
        }
    }

    /// Snapshot of every row, for assertions.
    pub fn all(&self) -> Vec<DurableJobRecord> {
        self.rows.lock().expect("job table lock poisoned").clone()
    }

    /// Look up a single row by job id.
    pub fn find(&self, job_id: &str) -> Option<DurableJobRecord> {
        self.rows
            .lock()
            .expect("job table lock poisoned")
            .iter()
            .find(|r| r.job_id == job_id)
            .cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<DurableJobRecord>>, TableError> {
        self.rows
            .lock()
            .map_err(|_| TableError::Unavailable("job table lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobTable for MemoryJobTable {
    async fn query(&self, filter: &JobFilter) -> Result<Vec<DurableJobRecord>, TableError> {
        let rows = self.lock()?;
        Ok(rows.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn bulk_update(
        &self,
        filter: &JobFilter,
        update: &JobUpdate,
    ) -> Result<usize, TableError> {
        let mut rows = self.lock()?;
        let mut touched = 0;
        for row in rows.iter_mut().filter(|r| filter.matches(r)) {
            if let Some(status) = update.status {
                row.status = status;
            }
            if let Some(next_run) = update.next_run {
                row.next_run = Some(next_run);
            }
            touched += 1;
        }
        Ok(touched)
    }

    async fn commit(&self, records: &[DurableJobRecord]) -> Result<(), TableError> {
        let mut rows = self.lock()?;
        for record in records {
            match rows.iter_mut().find(|r| r.job_id == record.job_id) {
                Some(existing) => *existing = record.clone(),
                None => rows.push(record.clone()),
            }
        }
        Ok(())
    }
}
