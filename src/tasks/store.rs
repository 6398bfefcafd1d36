//! In-memory task store.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaskError;
use crate::tasks::model::{Task, TaskPriority, TaskStatus, TaskSummary};

#[derive(Default)]
struct StoreInner {
    tasks: HashMap<Uuid, Task>,
    /// Insertion order of task IDs.
    order: Vec<Uuid>,
}

impl StoreInner {
    fn ordered(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    fn dependencies_completed(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        })
    }
}

/// Owns every task and its lifecycle status.
pub struct TaskStore {
    inner: RwLock<StoreInner>,
    /// Reject status writes that skip the lifecycle.
    strict_transitions: bool,
}

impl TaskStore {
    /// Create an empty store.
    pub fn new(strict_transitions: bool) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            strict_transitions,
        }
    }

    /// Create a new pending task.
    pub async fn create(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        assigned_to: impl Into<String>,
        priority: TaskPriority,
        dependencies: Vec<Uuid>,
    ) -> Result<Task, TaskError> {
        let task = Task::new(title, description, assigned_to)
            .with_priority(priority)
            .with_dependencies(dependencies);
        self.insert(task).await
    }

    /// Add a pre-built task. It is stored as pending with fresh timestamps.
    pub async fn insert(&self, mut task: Task) -> Result<Task, TaskError> {
        if task.assigned_to.trim().is_empty() {
            return Err(TaskError::MissingAssignee);
        }

        let now = Utc::now();
        task.status = TaskStatus::Pending;
        task.created_at = now;
        task.updated_at = now;

        let mut inner = self.inner.write().await;
        if inner.tasks.contains_key(&task.id) {
            task.id = Uuid::new_v4();
        }
        inner.order.push(task.id);
        inner.tasks.insert(task.id, task.clone());
        drop(inner);

        tracing::info!(
            task_id = %task.id,
            agent = %task.assigned_to,
            priority = %task.priority,
            "Created task: {}",
            task.title
        );
        Ok(task)
    }

    /// Get a task by ID.
    pub async fn get(&self, id: Uuid) -> Option<Task> {
        self.inner.read().await.tasks.get(&id).cloned()
    }

    /// All tasks in insertion order.
    pub async fn list_all(&self) -> Vec<Task> {
        self.inner.read().await.ordered().cloned().collect()
    }

    /// Tasks assigned to the given agent, in insertion order.
    pub async fn list_by_agent(&self, agent: &str) -> Vec<Task> {
        self.inner
            .read()
            .await
            .ordered()
            .filter(|t| t.assigned_to == agent)
            .cloned()
            .collect()
    }

    /// Tasks in the given status, in insertion order.
    pub async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.inner
            .read()
            .await
            .ordered()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Pending tasks whose dependencies all exist and are completed.
    ///
    /// A dependency that does not resolve to a stored task keeps the
    /// dependent task ineligible.
    pub async fn list_eligible(&self) -> Vec<Task> {
        let inner = self.inner.read().await;
        inner
            .ordered()
            .filter(|t| t.status == TaskStatus::Pending && inner.dependencies_completed(t))
            .cloned()
            .collect()
    }

    /// Write a new status and refresh `updated_at`.
    pub async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, TaskError> {
        let mut inner = self.inner.write().await;
        let task = inner.tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;

        if self.strict_transitions && !task.status.can_transition_to(status) {
            return Err(TaskError::InvalidTransition {
                id,
                from: task.status,
                to: status,
            });
        }

        task.status = status;
        task.updated_at = Utc::now();
        let updated = task.clone();
        drop(inner);

        tracing::debug!(task_id = %id, status = %status, "Updated task status");
        Ok(updated)
    }

    /// Remove a task. Returns whether it existed.
    pub async fn delete(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        if inner.tasks.remove(&id).is_none() {
            return false;
        }
        inner.order.retain(|t| *t != id);
        true
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }

    /// Count tasks per status.
    pub async fn summary(&self) -> TaskSummary {
        let inner = self.inner.read().await;

        let mut summary = TaskSummary::default();
        for task in inner.tasks.values() {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
            }
        }

        summary.total = inner.tasks.len();
        summary
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(true)
    }
}
