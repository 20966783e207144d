//! In-memory trigger store and fire clock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::SchedulerError;
use crate::resolver::{Callable, CallableResolver};
use crate::types::{JobDefinition, TriggerEntry, TriggerStatus};

/// Minimum sleep duration between clock-loop wakeups.
const MIN_SLEEP_SECS: u64 = 1;

/// Maximum sleep duration between clock-loop wakeups.
const MAX_SLEEP_SECS: u64 = 60;

/// A registered trigger: public entry plus the compiled schedule and the
/// resolved callable.
struct Trigger {
    entry: TriggerEntry,
    schedule: cron::Schedule,
    callable: Callable,
}

/// The authoritative set of live triggers.
///
/// All mutations go through a single write lock, so concurrent callers see
/// whole operations, never partially applied ones. The fire clock runs on
/// its own task ([`TriggerStore::run`]) and dispatches job bodies via
/// `tokio::spawn` — a slow job never delays other due triggers.
pub struct TriggerStore {
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn CallableResolver>,
    triggers: RwLock<HashMap<String, Trigger>>,
}

impl TriggerStore {
    /// Create an empty store.
    pub fn new(resolver: Arc<dyn CallableResolver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            resolver,
            triggers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a trigger for `definition`.
    ///
    /// Compiles the cron schedule and resolves the callable up front; both
    /// failures abort the add. Registration under an existing id is
    /// rejected — idempotency is the registry's concern, not the store's.
    pub async fn add(&self, definition: JobDefinition) -> Result<(), SchedulerError> {
        let schedule = definition.cron.clone().unwrap_or_default().compile()?;
        let callable = self.resolver.resolve(&definition.callable)?;

        let mut triggers = self.triggers.write().await;
        if triggers.contains_key(&definition.id) {
            return Err(SchedulerError::TriggerExists(definition.id));
        }

        let now = self.clock.now();
        let next_fire = match definition.next_run {
            Some(at) => at,
            None => next_occurrence(&schedule, now, &definition)?,
        };

        debug!(id = %definition.id, %next_fire, "registered trigger");
        triggers.insert(
            definition.id.clone(),
            Trigger {
                entry: TriggerEntry {
                    definition,
                    next_fire,
                    status: TriggerStatus::Active,
                },
                schedule,
                callable,
            },
        );
        Ok(())
    }

    /// Remove a trigger.
    pub async fn remove(&self, id: &str) -> Result<(), SchedulerError> {
        let mut triggers = self.triggers.write().await;
        triggers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::TriggerNotFound(id.to_string()))
    }

    /// Get a trigger by id.
    pub async fn get(&self, id: &str) -> Option<TriggerEntry> {
        self.triggers.read().await.get(id).map(|t| t.entry.clone())
    }

    /// All triggers, ordered by next fire time.
    pub async fn list(&self) -> Vec<TriggerEntry> {
        let triggers = self.triggers.read().await;
        let mut entries: Vec<_> = triggers.values().map(|t| t.entry.clone()).collect();
        entries.sort_by_key(|e| e.next_fire);
        entries
    }

    /// Take a trigger off the fire clock without deleting its definition.
    pub async fn pause(&self, id: &str) -> Result<TriggerStatus, SchedulerError> {
        let mut triggers = self.triggers.write().await;
        let trigger = triggers
            .get_mut(id)
            .ok_or_else(|| SchedulerError::TriggerNotFound(id.to_string()))?;
        trigger.entry.status = TriggerStatus::Paused;
        info!(id, "paused trigger");
        Ok(trigger.entry.status)
    }

    /// Re-admit a trigger to the fire clock.
    ///
    /// If the stored fire time already elapsed while paused, `coalesce`
    /// decides what happens: true fires a single catch-up immediately;
    /// false drops the missed occurrences and advances to the next one on
    /// the cron schedule.
    pub async fn resume(&self, id: &str) -> Result<TriggerStatus, SchedulerError> {
        let mut triggers = self.triggers.write().await;
        let trigger = triggers
            .get_mut(id)
            .ok_or_else(|| SchedulerError::TriggerNotFound(id.to_string()))?;

        let now = self.clock.now();
        if trigger.entry.next_fire <= now {
            trigger.entry.next_fire = if trigger.entry.definition.coalesce {
                now
            } else {
                next_occurrence(&trigger.schedule, now, &trigger.entry.definition)?
            };
        }
        trigger.entry.status = TriggerStatus::Active;
        info!(id, next_fire = %trigger.entry.next_fire, "resumed trigger");
        Ok(trigger.entry.status)
    }

    /// Fire every due trigger and reschedule it. Returns the number fired.
    ///
    /// Job bodies are spawned onto the runtime; this method only blocks for
    /// the duration of the bookkeeping.
    pub async fn fire_due(&self) -> usize {
        let now = self.clock.now();
        let mut triggers = self.triggers.write().await;
        let mut fired = 0;

        for (id, trigger) in triggers.iter_mut() {
            if trigger.entry.status != TriggerStatus::Active || trigger.entry.next_fire > now {
                continue;
            }

            let callable = Arc::clone(&trigger.callable);
            let args = trigger.entry.definition.args.clone();
            let kwargs = trigger.entry.definition.kwargs.clone();
            let job_id = id.clone();
            info!(id = %job_id, "firing trigger");
            tokio::spawn(async move {
                if let Err(error) = callable(args, kwargs).await {
                    warn!(id = %job_id, %error, "job invocation failed");
                }
            });
            fired += 1;

            match trigger.schedule.after(&now).next() {
                Some(next) => trigger.entry.next_fire = next,
                None => {
                    // Schedule exhausted (e.g. a fixed date in the past).
                    warn!(id = %id, "no further occurrences, pausing trigger");
                    trigger.entry.status = TriggerStatus::Paused;
                }
            }
        }

        fired
    }

    /// Run the fire clock until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!("fire clock started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let fired = self.fire_due().await;
            if fired > 0 {
                debug!(fired, "dispatched due triggers");
            }

            let sleep_duration = self.sleep_duration().await;
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = sleep(sleep_duration) => {}
            }
        }

        info!("fire clock stopped");
    }

    /// How long the clock loop may sleep before the earliest active trigger
    /// is due, bounded to [`MIN_SLEEP_SECS`]..[`MAX_SLEEP_SECS`].
    pub async fn sleep_duration(&self) -> std::time::Duration {
        let triggers = self.triggers.read().await;
        let now = self.clock.now();

        let next_due = triggers
            .values()
            .filter(|t| t.entry.status == TriggerStatus::Active)
            .map(|t| t.entry.next_fire)
            .min();

        let secs = match next_due {
            Some(next) => {
                let diff = (next - now).num_seconds();
                (diff.max(MIN_SLEEP_SECS as i64) as u64).min(MAX_SLEEP_SECS)
            }
            None => MAX_SLEEP_SECS,
        };

        std::time::Duration::from_secs(secs)
    }
}

fn next_occurrence(
    schedule: &cron::Schedule,
    after: DateTime<Utc>,
    definition: &JobDefinition,
) -> Result<DateTime<Utc>, SchedulerError> {
    schedule.after(&after).next().ok_or_else(|| {
        let expression = definition
            .cron
            .clone()
            .unwrap_or_default()
            .to_expression();
        SchedulerError::NoUpcomingFire(expression)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::cron::CronSchedule;
    use crate::resolver::CallableRegistry;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn harness() -> (Arc<TriggerStore>, Arc<ManualClock>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = CallableRegistry::new();
        registry.register("tasks.demo.run", move |_args, _kwargs| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let store = Arc::new(TriggerStore::new(
            Arc::new(registry),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        (store, clock, calls)
    }

    fn hourly_job(id: &str) -> JobDefinition {
        let mut def = JobDefinition::new(id, "tasks.demo.run");
        def.cron = Some(CronSchedule::parse(Some("0 0 * * * ?")).unwrap());
        def
    }

    #[tokio::test]
    async fn add_rejects_duplicate_id() {
        let (store, _, _) = harness();
        store.add(hourly_job("a")).await.unwrap();
        let err = store.add(hourly_job("a")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::TriggerExists(_)));

        let entries = store.list().await;
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_unknown_callable() {
        let (store, _, _) = harness();
        let mut def = hourly_job("a");
        def.callable = "tasks.nowhere".to_string();
        let err = store.add(def).await.unwrap_err();
        assert!(matches!(err, SchedulerError::CallableNotFound(_)));
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn explicit_next_run_overrides_schedule() {
        let (store, _, _) = harness();
        let mut def = hourly_job("a");
        let at = fixed_now() + Duration::minutes(5);
        def.next_run = Some(at);
        store.add(def).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().next_fire, at);
    }

    #[tokio::test]
    async fn first_fire_from_schedule_when_no_next_run() {
        let (store, _, _) = harness();
        store.add(hourly_job("a")).await.unwrap();
        // Next top of the hour after 12:00:00 is 13:00:00.
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        assert_eq!(store.get("a").await.unwrap().next_fire, expected);
    }

    #[tokio::test]
    async fn list_orders_by_next_fire() {
        let (store, _, _) = harness();
        let mut early = hourly_job("early");
        early.next_run = Some(fixed_now() + Duration::minutes(1));
        let mut late = hourly_job("late");
        late.next_run = Some(fixed_now() + Duration::hours(2));
        store.add(late).await.unwrap();
        store.add(early).await.unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .into_iter()
            .map(|e| e.definition.id)
            .collect();
        assert_eq!(ids, vec!["early".to_string(), "late".to_string()]);
    }

    #[tokio::test]
    async fn pause_keeps_definition_off_the_clock() {
        let (store, clock, calls) = harness();
        let mut def = hourly_job("a");
        def.next_run = Some(fixed_now() + Duration::minutes(1));
        store.add(def).await.unwrap();

        let status = store.pause("a").await.unwrap();
        assert_eq!(status, TriggerStatus::Paused);
        assert!(store.get("a").await.is_some());

        clock.advance(Duration::minutes(10));
        assert_eq!(store.fire_due().await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_unknown_id_is_not_found() {
        let (store, _, _) = harness();
        let err = store.pause("ghost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::TriggerNotFound(_)));
    }

    #[tokio::test]
    async fn resume_before_fire_time_keeps_it() {
        let (store, _, _) = harness();
        let mut def = hourly_job("a");
        let at = fixed_now() + Duration::minutes(30);
        def.next_run = Some(at);
        store.add(def).await.unwrap();

        store.pause("a").await.unwrap();
        let status = store.resume("a").await.unwrap();
        assert_eq!(status, TriggerStatus::Active);
        assert_eq!(store.get("a").await.unwrap().next_fire, at);
    }

    #[tokio::test]
    async fn resume_after_miss_without_coalesce_skips_to_next_occurrence() {
        let (store, clock, _) = harness();
        let mut def = hourly_job("a");
        def.next_run = Some(fixed_now() + Duration::minutes(1));
        store.add(def).await.unwrap();
        store.pause("a").await.unwrap();

        clock.advance(Duration::hours(3));
        store.resume("a").await.unwrap();

        let next_fire = store.get("a").await.unwrap().next_fire;
        assert!(next_fire > clock.now());
        // 15:00 + next top of hour = 16:00.
        assert_eq!(next_fire, Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn resume_after_miss_with_coalesce_fires_one_catch_up() {
        let (store, clock, _) = harness();
        let mut def = hourly_job("a");
        def.coalesce = true;
        def.next_run = Some(fixed_now() + Duration::minutes(1));
        store.add(def).await.unwrap();
        store.pause("a").await.unwrap();

        clock.advance(Duration::hours(3));
        store.resume("a").await.unwrap();

        // A single catch-up replaces all missed occurrences.
        assert_eq!(store.get("a").await.unwrap().next_fire, clock.now());
    }

    #[tokio::test]
    async fn fire_due_invokes_and_reschedules() {
        let (store, clock, calls) = harness();
        let mut def = hourly_job("a");
        def.next_run = Some(fixed_now() + Duration::minutes(1));
        store.add(def).await.unwrap();

        clock.advance(Duration::minutes(2));
        assert_eq!(store.fire_due().await, 1);

        // The invocation runs off the clock path; wait for it to land.
        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Rescheduled to the next cron occurrence, in the future.
        let next_fire = store.get("a").await.unwrap().next_fire;
        assert!(next_fire > clock.now());

        // Nothing further is due until then.
        assert_eq!(store.fire_due().await, 0);
    }

    #[tokio::test]
    async fn sleep_duration_is_bounded() {
        let (store, _, _) = harness();
        assert_eq!(store.sleep_duration().await.as_secs(), MAX_SLEEP_SECS);

        let mut soon = hourly_job("soon");
        soon.next_run = Some(fixed_now() + Duration::seconds(5));
        store.add(soon).await.unwrap();
        assert_eq!(store.sleep_duration().await.as_secs(), 5);

        let mut overdue = hourly_job("overdue");
        overdue.next_run = Some(fixed_now() - Duration::seconds(30));
        store.add(overdue).await.unwrap();
        assert_eq!(store.sleep_duration().await.as_secs(), MIN_SLEEP_SECS);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_not_found() {
        let (store, _, _) = harness();
        let err = store.remove("ghost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::TriggerNotFound(_)));
    }
}
