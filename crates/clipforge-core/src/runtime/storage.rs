use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{TaskError, TransitionError};
use crate::params::GenerationParameters;
use crate::runtime::types::{TaskId, TaskRecord};

/// Thread-safe registry of every known task.
///
/// Uses a `tokio::sync::RwLock<HashMap>` so status queries run concurrently
/// with each other while updates from workers are serialized.  Readers only
/// ever receive cloned snapshots.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a `pending` record for it.
    pub async fn create(
        &self,
        parameters: GenerationParameters,
        created_at: DateTime<Utc>,
    ) -> TaskId {
        let mut guard = self.inner.write().await;
        let mut task_id = TaskId::random();
        while guard.contains_key(&task_id) {
            task_id = TaskId::random();
        }
        guard.insert(task_id, TaskRecord::new(task_id, parameters, created_at));
        task_id
    }

    /// Return a snapshot of the record.
    pub async fn get(&self, task_id: TaskId) -> Option<TaskRecord> {
        self.inner.read().await.get(&task_id).cloned()
    }

    /// Apply `update` to a copy of the record and commit it if the result is
    /// a legal successor.
    ///
    /// On any error the stored record is left untouched.
    pub async fn mutate<F>(&self, task_id: TaskId, update: F) -> Result<TaskRecord, TaskError>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), TransitionError>,
    {
        let mut guard = self.inner.write().await;
        let current = guard
            .get_mut(&task_id)
            .ok_or(TaskError::NotFound { task_id })?;

        let mut next = current.clone();
        update(&mut next)?;
        current.validate_successor(&next)?;
        *current = next.clone();
        Ok(next)
    }

    /// Remove a record.  Returns `false` if it was not present.
    pub async fn delete(&self, task_id: TaskId) -> bool {
        self.inner.write().await.remove(&task_id).is_some()
    }

    /// Remove every record matching `predicate`, returning the removed ids.
    pub async fn delete_where<P>(&self, mut predicate: P) -> Vec<TaskId>
    where
        P: FnMut(&TaskRecord) -> bool,
    {
        let mut guard = self.inner.write().await;
        let mut removed = Vec::new();
        guard.retain(|id, record| {
            if predicate(record) {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Snapshot of every record, in no particular order.
    pub async fn list_all(&self) -> Vec<TaskRecord> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GenerationRequest;
    use crate::profile::ProfileTable;
    use crate::runtime::types::TaskStatus;

    fn params(prompt: &str) -> GenerationParameters {
        GenerationRequest::new(prompt)
            .resolve(&ProfileTable::default())
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_pending_snapshot() {
        let store = TaskStore::new();
        let id = store.create(params("red"), Utc::now()).await;
        let record = store.get(id).await.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let store = TaskStore::new();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..64 {
            ids.insert(store.create(params("x"), Utc::now()).await);
        }
        assert_eq!(ids.len(), 64);
    }

    #[tokio::test]
    async fn mutate_commits_legal_updates() {
        let store = TaskStore::new();
        let id = store.create(params("red"), Utc::now()).await;
        let updated = store.mutate(id, TaskRecord::start_processing).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Processing);
        assert_eq!(store.get(id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_record_untouched() {
        let store = TaskStore::new();
        let id = store.create(params("red"), Utc::now()).await;
        let before = store.get(id).await.unwrap();

        let err = store
            .mutate(id, |r| {
                r.message = "scribbled".into();
                r.complete("x", Utc::now())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Transition(_)));

        let err = store
            .mutate(id, |r| {
                r.progress = 100;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Transition(_)));

        assert_eq!(store.get(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn mutate_unknown_task_is_not_found() {
        let store = TaskStore::new();
        let missing = TaskId::random();
        let err = store.mutate(missing, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, TaskError::NotFound { task_id } if task_id == missing));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = TaskStore::new();
        let id = store.create(params("red"), Utc::now()).await;
        assert!(store.delete(id).await);
        assert!(!store.delete(id).await);
        assert!(store.get(id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn snapshots_do_not_alias_the_store() {
        let store = TaskStore::new();
        let id = store.create(params("red"), Utc::now()).await;
        let mut snapshot = store.get(id).await.unwrap();
        snapshot.message = "changed locally".into();
        assert_eq!(store.get(id).await.unwrap().message, "Task created");
    }
}
