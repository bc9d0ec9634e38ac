use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::runtime::clock::Clock;
use crate::runtime::storage::TaskStore;

/// Removes finished tasks once they are older than a retention window.
///
/// Only terminal records are eligible, and age is measured from
/// `completed_at`, so a long render is never purged while it runs.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    store: TaskStore,
    clock: Arc<dyn Clock>,
}

impl RetentionSweeper {
    pub fn new(store: TaskStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Delete terminal tasks that completed strictly before `now - max_age`.
    /// Returns how many were removed.
    pub async fn purge(&self, max_age: TimeDelta) -> usize {
        let Some(cutoff) = self.clock.now().checked_sub_signed(max_age) else {
            return 0;
        };

        let removed = self
            .store
            .delete_where(|record| {
                record.is_terminal() && record.completed_at.is_some_and(|at| at < cutoff)
            })
            .await;

        for task_id in &removed {
            debug!(%task_id, "purged expired task");
        }
        if !removed.is_empty() {
            info!(count = removed.len(), %cutoff, "retention sweep removed tasks");
        }
        removed.len()
    }

    pub async fn purge_older_than(&self, hours: u64) -> usize {
        let max_age = i64::try_from(hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .unwrap_or(TimeDelta::MAX);
        self.purge(max_age).await
    }

    /// Sweep every `interval` in the background.
    ///
    /// The first sweep happens one interval after the call.
    pub fn spawn(self, interval: Duration, max_age_hours: u64) -> JoinHandle<()> {
        let period = interval.max(Duration::from_secs(1));
        info!(?period, max_age_hours, "retention sweeper started");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = self.purge_older_than(max_age_hours).await;
                debug!(purged, "retention sweep finished");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GenerationRequest;
    use crate::profile::ProfileTable;
    use crate::runtime::clock::ManualClock;
    use crate::runtime::types::{TaskId, TaskRecord};
    use chrono::{DateTime, Utc};

    async fn finished_task(store: &TaskStore, created: DateTime<Utc>, done: DateTime<Utc>) -> TaskId {
        let params = GenerationRequest::new("sky")
            .resolve(&ProfileTable::default())
            .unwrap();
        let id = store.create(params, created).await;
        store
            .mutate(id, |r| {
                r.start_processing()?;
                r.complete("outputs/x.mp4", done)
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn purges_only_terminal_tasks_past_cutoff() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = TaskStore::new();
        let sweeper = RetentionSweeper::new(store.clone(), clock.clone());

        let old = finished_task(&store, start, start).await;
        let recent = finished_task(&store, start, start + TimeDelta::hours(20)).await;
        let params = GenerationRequest::new("pending")
            .resolve(&ProfileTable::default())
            .unwrap();
        let running = store.create(params, start).await;
        store.mutate(running, TaskRecord::start_processing).await.unwrap();

        clock.set(start + TimeDelta::hours(25));
        assert_eq!(sweeper.purge_older_than(24).await, 1);

        assert!(store.get(old).await.is_none());
        assert!(store.get(recent).await.is_some());
        assert!(store.get(running).await.is_some());
    }

    #[tokio::test]
    async fn failed_tasks_are_purged_too() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = TaskStore::new();
        let sweeper = RetentionSweeper::new(store.clone(), clock.clone());

        let params = GenerationRequest::new("storm")
            .resolve(&ProfileTable::default())
            .unwrap();
        let failed = store.create(params, start).await;
        store
            .mutate(failed, |r| {
                r.start_processing()?;
                r.fail("render failed", start)
            })
            .await
            .unwrap();
        let completed = finished_task(&store, start, start).await;

        clock.set(start + TimeDelta::hours(25));
        assert_eq!(sweeper.purge_older_than(24).await, 2);
        assert!(store.get(failed).await.is_none());
        assert!(store.get(completed).await.is_none());
    }

    #[tokio::test]
    async fn cutoff_is_strict() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start + TimeDelta::hours(1)));
        let store = TaskStore::new();
        let sweeper = RetentionSweeper::new(store.clone(), clock);
        finished_task(&store, start, start).await;

        assert_eq!(sweeper.purge(TimeDelta::hours(1)).await, 0);
        assert_eq!(sweeper.purge(TimeDelta::minutes(59)).await, 1);
    }

    #[tokio::test]
    async fn huge_retention_purges_nothing() {
        let store = TaskStore::new();
        let now = Utc::now();
        let sweeper = RetentionSweeper::new(store.clone(), Arc::new(ManualClock::new(now)));
        finished_task(&store, now - TimeDelta::days(3650), now - TimeDelta::days(3650)).await;
        assert_eq!(sweeper.purge_older_than(u64::MAX).await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sweep_runs_on_interval() {
        let now = Utc::now();
        let store = TaskStore::new();
        finished_task(&store, now - TimeDelta::hours(48), now - TimeDelta::hours(48)).await;
        let sweeper = RetentionSweeper::new(store.clone(), Arc::new(ManualClock::new(now)));

        let handle = sweeper.spawn(Duration::from_secs(60), 24);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len().await, 1);

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(31)).await;
            if store.is_empty().await {
                break;
            }
        }
        assert!(store.is_empty().await);
        handle.abort();
    }
}
