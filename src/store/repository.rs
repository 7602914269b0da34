//! Task repository: the process-wide collection and its mutations.
//!
//! Every operation takes the same async mutex, so read-modify-write
//! sequences never interleave. Mutations are applied to a copy of the
//! document, the copy is persisted, and only then does it replace the
//! in-memory state.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::store::document::{DocumentStore, StoreError};
use crate::store::task::{Task, TaskDocument, TaskFilter, TaskId};

/// Failures of repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("invalid task fields: {0}")]
    InvalidFields(#[source] serde_json::Error),

    #[error("task id space exhausted")]
    IdsExhausted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shared handle on the task collection.
#[derive(Clone)]
pub struct TaskRepository {
    state: Arc<Mutex<TaskDocument>>,
    store: Arc<dyn DocumentStore>,
}

impl TaskRepository {
    /// Load the collection from `store`. Fails when the store is unavailable.
    pub async fn load(store: Arc<dyn DocumentStore>) -> Result<Self, StoreError> {
        let mut document = store.load().await?;
        let next_id = document.resolved_next_id().ok_or_else(|| StoreError::Unavailable {
            location: store.location(),
            reason: format!("task id {} leaves no room for new ids", TaskId::MAX),
        })?;
        document.next_id = Some(next_id);
        metrics::record_task_count(document.tasks.len());

        Ok(Self {
            state: Arc::new(Mutex::new(document)),
            store,
        })
    }

    pub async fn list_all(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn filter(&self, filter: &TaskFilter) -> Vec<Task> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    pub async fn find_by_id(&self, id: TaskId) -> Result<Task, RepositoryError> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    pub async fn create(&self, title: String) -> Result<Task, RepositoryError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        let id = next.resolved_next_id().ok_or(RepositoryError::IdsExhausted)?;
        let following = id.checked_add(1).ok_or(RepositoryError::IdsExhausted)?;
        let task = Task::new(id, title);
        next.tasks.push(task.clone());
        next.next_id = Some(following);

        self.commit(&mut state, next).await?;
        tracing::info!(task_id = id, "Task created");
        Ok(task)
    }

    /// Shallow-merge `patch` onto the task with `id`. A supplied `id` field is ignored.
    pub async fn update(
        &self,
        id: TaskId,
        patch: &Map<String, Value>,
    ) -> Result<Task, RepositoryError> {
        let mut state = self.state.lock().await;
        let index = state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        let updated = state.tasks[index]
            .merged(patch)
            .map_err(RepositoryError::InvalidFields)?;
        let mut next = state.clone();
        next.tasks[index] = updated.clone();

        self.commit(&mut state, next).await?;
        tracing::info!(task_id = id, fields = patch.len(), "Task updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: TaskId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let index = state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        let mut next = state.clone();
        next.tasks.remove(index);

        self.commit(&mut state, next).await?;
        tracing::info!(task_id = id, "Task deleted");
        Ok(())
    }

    /// Copy of the committed document.
    pub async fn snapshot(&self) -> TaskDocument {
        self.state.lock().await.clone()
    }

    async fn commit(&self, state: &mut TaskDocument, next: TaskDocument) -> Result<(), StoreError> {
        match self.store.persist(&next).await {
            Ok(()) => {
                metrics::record_persist("ok");
                metrics::record_task_count(next.tasks.len());
                *state = next;
                Ok(())
            }
            Err(e) => {
                metrics::record_persist("error");
                tracing::error!(location = %self.store.location(), error = %e, "Persist failed, mutation discarded");
                Err(e)
            }
        }
    }
}
