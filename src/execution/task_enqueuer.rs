//! # Task Enqueuer
//!
//! Fire-and-forget task submission. The enqueuer owns the task table shared
//! with the engine and the sending half of the dispatch queue; workers hold
//! an `Arc<TaskEnqueuer>` to submit follow-up tasks from delayed actions.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{names, EventPublisher};
use crate::execution::task::{Task, TaskStatus};

/// Engine-owned task table.
///
/// Task rows belong exclusively to the engine; callers observe them through
/// read-only snapshots.
#[derive(Clone, Default)]
pub struct TaskStore {
    tasks: Arc<DashMap<Uuid, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.insert(task.task_id, task);
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.get(&id).map(|entry| entry.value().clone())
    }

    pub fn update(&self, task: &Task) {
        self.tasks.insert(task.task_id, task.clone());
    }

    pub fn all(&self) -> Vec<Task> {
        self.tasks.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Atomically claim a queued task for execution, bumping its attempt
    /// count. Returns `None` if the task is missing, already running, or
    /// terminal; the caller must then skip the dispatch.
    pub(crate) fn claim(&self, id: Uuid) -> Option<Task> {
        let mut entry = self.tasks.get_mut(&id)?;
        if entry.status != TaskStatus::Queued {
            return None;
        }
        entry.status = TaskStatus::Running;
        entry.attempts += 1;
        entry.updated_at = chrono::Utc::now();
        Some(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Submission handle: persists a task and queues it for dispatch.
pub struct TaskEnqueuer {
    store: TaskStore,
    sender: mpsc::UnboundedSender<Uuid>,
    events: EventPublisher,
}

impl TaskEnqueuer {
    /// Create the enqueuer and the receiving half of the dispatch queue
    pub fn new(events: EventPublisher) -> (Arc<Self>, mpsc::UnboundedReceiver<Uuid>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let enqueuer = Arc::new(Self {
            store: TaskStore::new(),
            sender,
            events,
        });
        (enqueuer, receiver)
    }

    /// Submit a task: persist it and queue it for dispatch.
    ///
    /// Fire-and-forget; returns immediately. At most one active execution
    /// per task is guaranteed by the single queue entry per submission.
    pub fn submit(&self, mut task: Task) {
        task.status = TaskStatus::Queued;
        task.updated_at = chrono::Utc::now();
        let task_id = task.task_id;
        let kind = task.kind();

        debug!(task_id = %task_id, task_type = %kind, "task submitted");
        self.store.insert(task);
        self.events.publish_sync(
            names::TASK_SUBMITTED,
            json!({ "task_id": task_id, "task_type": kind.to_string() }),
        );

        if self.sender.send(task_id).is_err() {
            // Dispatcher gone; the task stays queued in the store and is
            // picked up by recovery on the next engine start.
            warn!(task_id = %task_id, "dispatch queue closed; task parked for recovery");
        }
    }

    /// Re-queue an existing task after a backoff delay
    pub(crate) fn requeue(&self, task_id: Uuid) {
        if let Some(mut task) = self.store.get(task_id) {
            task.status = TaskStatus::Queued;
            task.updated_at = chrono::Utc::now();
            self.store.update(&task);
        }
        if self.sender.send(task_id).is_err() {
            warn!(task_id = %task_id, "dispatch queue closed; task parked for recovery");
        }
    }

    pub(crate) fn store(&self) -> TaskStore {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_persists_and_queues() {
        let (enqueuer, mut receiver) = TaskEnqueuer::new(EventPublisher::new(16));
        let task = Task::create_registry("r1");
        let task_id = task.task_id;

        enqueuer.submit(task);

        assert_eq!(receiver.recv().await, Some(task_id));
        let stored = enqueuer.store().get(task_id).unwrap();
        assert_eq!(stored.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_submit_publishes_lifecycle_event() {
        let events = EventPublisher::new(16);
        let mut subscription = events.subscribe();
        let (enqueuer, _receiver) = TaskEnqueuer::new(events);

        enqueuer.submit(Task::create_registry("r1"));

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.name, names::TASK_SUBMITTED);
        assert_eq!(event.context["task_type"], "CREATE_REGISTRY");
    }

    #[tokio::test]
    async fn test_submit_survives_closed_queue() {
        let (enqueuer, receiver) = TaskEnqueuer::new(EventPublisher::new(16));
        drop(receiver);

        let task = Task::create_registry("r1");
        let task_id = task.task_id;
        enqueuer.submit(task);

        // Parked in the store for recovery, not lost
        assert!(enqueuer.store().get(task_id).is_some());
    }
}
