//! # Task Manager
//!
//! The durable task-execution engine: submission, dispatch, bounded retry
//! with backoff, unconditional compensation on terminal outcomes, and
//! post-commit delayed follow-ups.
//!
//! ## Execution model
//!
//! A single dispatcher loop pulls task ids from the queue and spawns
//! semaphore-bounded attempts. Each attempt runs the matched worker's
//! forward logic inside one storage transaction; on commit the attempt's
//! delayed actions fire, then compensation runs in its own transaction.
//! A transient failure re-queues the task after a backoff delay until the
//! attempt bound is reached; exhaustion (or a permanent error) records the
//! failure and still triggers compensation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::events::{names, EventPublisher};
use crate::execution::backoff_calculator::BackoffCalculator;
use crate::execution::task::{Task, TaskKind, TaskStatus};
use crate::execution::task_enqueuer::{TaskEnqueuer, TaskStore};
use crate::execution::worker::{DelayedAction, Worker, WorkerContext, WorkerError};
use crate::execution::workers::{
    CreateRegistryWorker, ProvisionRegistryTenantWorker, RegistryHeartbeatWorker,
    ScheduleRegistryWorker,
};
use crate::logging;
use crate::services::auth::AuthService;
use crate::services::tenant_manager::TenantManagerClient;
use crate::storage::ResourceStorage;

pub struct TaskManager {
    inner: Arc<EngineInner>,
    queue: Mutex<Option<mpsc::UnboundedReceiver<Uuid>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

struct EngineInner {
    store: TaskStore,
    enqueuer: Arc<TaskEnqueuer>,
    storage: Arc<dyn ResourceStorage>,
    workers: Vec<Arc<dyn Worker>>,
    dispatch_table: HashMap<TaskKind, usize>,
    backoff: BackoffCalculator,
    events: EventPublisher,
    semaphore: Arc<Semaphore>,
    config: FleetConfig,
}

impl EngineInner {
    fn worker_for(&self, kind: TaskKind) -> Option<Arc<dyn Worker>> {
        self.dispatch_table
            .get(&kind)
            .map(|index| self.workers[*index].clone())
    }
}

impl TaskManager {
    /// Construct the engine with an explicit worker set.
    ///
    /// Fails with a configuration error unless every task type is owned by
    /// exactly one worker.
    pub fn new(
        storage: Arc<dyn ResourceStorage>,
        workers: Vec<Arc<dyn Worker>>,
        enqueuer: Arc<TaskEnqueuer>,
        queue: mpsc::UnboundedReceiver<Uuid>,
        events: EventPublisher,
        config: FleetConfig,
    ) -> Result<Self> {
        let dispatch_table = build_dispatch_table(&workers)?;
        let (shutdown, _) = watch::channel(false);
        let inner = Arc::new(EngineInner {
            store: enqueuer.store(),
            enqueuer,
            storage,
            workers,
            dispatch_table,
            backoff: BackoffCalculator::new(config.backoff.clone()),
            events,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
            config,
        });
        Ok(Self {
            inner,
            queue: Mutex::new(Some(queue)),
            dispatcher: Mutex::new(None),
            shutdown,
        })
    }

    /// Construct the engine wired with the standard provisioning pipeline
    /// workers.
    pub fn with_default_workers(
        storage: Arc<dyn ResourceStorage>,
        auth: Arc<dyn AuthService>,
        tenant_manager: Arc<dyn TenantManagerClient>,
        config: FleetConfig,
    ) -> Result<Self> {
        let events = EventPublisher::new(config.event_channel_capacity);
        let (enqueuer, queue) = TaskEnqueuer::new(events.clone());
        let workers: Vec<Arc<dyn Worker>> = vec![
            Arc::new(CreateRegistryWorker::new(enqueuer.clone())),
            Arc::new(ScheduleRegistryWorker::new(
                config.deployments.clone(),
                enqueuer.clone(),
            )),
            Arc::new(ProvisionRegistryTenantWorker::new(
                auth,
                tenant_manager.clone(),
                enqueuer.clone(),
            )),
            Arc::new(RegistryHeartbeatWorker::new(tenant_manager)),
        ];
        Self::new(storage, workers, enqueuer, queue, events, config)
    }

    /// Start the dispatch loop, recovering any task left non-terminal by a
    /// previous run first.
    pub async fn start(&self) -> Result<()> {
        let receiver = self.queue.lock().take().ok_or_else(|| {
            FleetError::ExecutionError("task manager already started".to_string())
        })?;
        self.recover();

        let inner = self.inner.clone();
        let shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(dispatch_loop(inner, receiver, shutdown_rx));
        *self.dispatcher.lock() = Some(handle);
        Ok(())
    }

    /// Stop intake and wait for in-flight attempts to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let drained = self
            .inner
            .semaphore
            .clone()
            .acquire_many_owned(self.inner.config.max_concurrent_tasks as u32)
            .await;
        drop(drained);
        info!("task manager shut down");
    }

    /// Submit a task; fire-and-forget
    pub fn submit(&self, task: Task) {
        self.inner.enqueuer.submit(task);
    }

    /// Submission handle for embedding layers and workers
    pub fn enqueuer(&self) -> Arc<TaskEnqueuer> {
        self.inner.enqueuer.clone()
    }

    /// Lifecycle event publisher
    pub fn events(&self) -> &EventPublisher {
        &self.inner.events
    }

    /// Engine-owned task table (read/seed access for embedding layers)
    pub fn store(&self) -> TaskStore {
        self.inner.store.clone()
    }

    /// Snapshot of one task row
    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.inner.store.get(id)
    }

    /// Snapshot of all task rows
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.store.all()
    }

    /// Poll until the task reaches a terminal status or the timeout expires
    pub async fn wait_for_terminal(&self, id: Uuid, timeout: Duration) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(task) = self.inner.store.get(id) {
                if task.status.is_terminal() {
                    return Some(task);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Crash recovery: any task found non-terminal is re-queued. A task
    /// that was Running when the previous process died is treated as
    /// retryable.
    fn recover(&self) {
        for task in self.inner.store.all() {
            match task.status {
                TaskStatus::Running | TaskStatus::RetryScheduled | TaskStatus::Queued => {
                    info!(
                        task_id = %task.task_id,
                        status = %task.status,
                        "recovering non-terminal task at startup"
                    );
                    self.inner.enqueuer.requeue(task.task_id);
                }
                TaskStatus::Succeeded | TaskStatus::Failed => {}
            }
        }
    }
}

async fn dispatch_loop(
    inner: Arc<EngineInner>,
    mut receiver: mpsc::UnboundedReceiver<Uuid>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        max_concurrent = inner.config.max_concurrent_tasks,
        "task dispatch loop started"
    );
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            next = receiver.recv() => {
                let Some(task_id) = next else { break };
                let permit = match inner.semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let inner = inner.clone();
                tokio::spawn(async move {
                    run_task_attempt(inner, task_id).await;
                    drop(permit);
                });
            }
        }
    }
    info!("task dispatch loop stopped");
}

async fn run_task_attempt(inner: Arc<EngineInner>, task_id: Uuid) {
    // Atomic claim enforces at most one active execution per task
    let Some(mut task) = inner.store.claim(task_id) else {
        debug!(task_id = %task_id, "skipping dispatch; task not claimable");
        return;
    };
    let attempt = task.attempts;
    let kind = task.kind();
    let Some(worker) = inner.worker_for(kind) else {
        // Unreachable: the dispatch table is validated at construction
        error!(task_id = %task_id, task_type = %kind, "no worker for task type");
        return;
    };

    debug!(
        task_id = %task_id,
        task_type = %kind,
        attempt = attempt,
        worker = worker.name(),
        "executing task attempt"
    );

    let outcome = execute_attempt(&inner, worker.as_ref(), &mut task, attempt).await;
    match outcome {
        Ok(delayed) => {
            // The attempt's transaction is durable; flush the commit hooks
            // before the terminal status becomes observable
            for action in delayed {
                action();
            }
            task.status = TaskStatus::Succeeded;
            task.updated_at = chrono::Utc::now();
            inner.store.update(&task);
            logging::log_task_operation(
                "execute",
                task.task_id,
                &kind.to_string(),
                "succeeded",
                None,
            );
            inner.events.publish_sync(
                names::TASK_SUCCEEDED,
                json!({ "task_id": task_id, "task_type": kind.to_string(), "attempts": attempt }),
            );
            run_compensation(&inner, worker.as_ref(), &mut task, None).await;
        }
        Err(err) if err.is_retryable() && attempt < inner.config.task_attempts_max => {
            task.status = TaskStatus::RetryScheduled;
            task.last_error = Some(err.to_string());
            task.updated_at = chrono::Utc::now();
            inner.store.update(&task);

            let delay = inner.backoff.delay_for_attempt(attempt);
            warn!(
                task_id = %task_id,
                task_type = %kind,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed; retry scheduled"
            );
            inner.events.publish_sync(
                names::TASK_RETRY_SCHEDULED,
                json!({ "task_id": task_id, "attempt": attempt, "delay_ms": delay.as_millis() as u64 }),
            );

            let enqueuer = inner.enqueuer.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                enqueuer.requeue(task_id);
            });
        }
        Err(err) => {
            task.last_error = Some(err.to_string());
            // Compensate before the terminal status becomes observable, so
            // a Failed task implies its cleanup already ran
            run_compensation(&inner, worker.as_ref(), &mut task, Some(&err)).await;
            task.status = TaskStatus::Failed;
            task.updated_at = chrono::Utc::now();
            inner.store.update(&task);
            logging::log_task_operation(
                "execute",
                task.task_id,
                &kind.to_string(),
                "failed",
                task.last_error.as_deref(),
            );
            inner.events.publish_sync(
                names::TASK_FAILED,
                json!({ "task_id": task_id, "task_type": kind.to_string(), "attempts": attempt, "error": err.to_string() }),
            );
        }
    }
}

/// One forward attempt inside one transaction scope: begin, run the worker,
/// commit on normal return, roll back on error, regardless of exit path.
async fn execute_attempt(
    inner: &EngineInner,
    worker: &dyn Worker,
    task: &mut Task,
    attempt: u32,
) -> std::result::Result<Vec<DelayedAction>, WorkerError> {
    let mut tx = inner.storage.begin().await?;
    let (result, delayed) = {
        let mut ctx = WorkerContext::new(tx.as_mut(), attempt, inner.config.task_attempts_max);
        let result = worker.execute(task, &mut ctx).await;
        let delayed = ctx.take_delayed();
        (result, delayed)
    };
    match result {
        Ok(()) => {
            tx.commit().await?;
            Ok(delayed)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed after attempt error");
            }
            Err(err)
        }
    }
}

/// Compensation in its own transaction, strictly ordered after the forward
/// attempt. Failures are logged and never resurrect the task.
async fn run_compensation(
    inner: &EngineInner,
    worker: &dyn Worker,
    task: &mut Task,
    error: Option<&WorkerError>,
) {
    let result: std::result::Result<Vec<DelayedAction>, WorkerError> = async {
        let mut tx = inner.storage.begin().await?;
        let (result, delayed) = {
            let mut ctx =
                WorkerContext::new(tx.as_mut(), task.attempts, inner.config.task_attempts_max);
            let result = worker.compensate(task, &mut ctx, error).await;
            let delayed = ctx.take_delayed();
            (result, delayed)
        };
        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(delayed)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after compensation error");
                }
                Err(err)
            }
        }
    }
    .await;

    inner.store.update(task);
    match result {
        Ok(delayed) => {
            debug!(task_id = %task.task_id, worker = worker.name(), "compensation committed");
            for action in delayed {
                action();
            }
        }
        Err(err) => {
            logging::log_error(
                "task_manager",
                "compensate",
                &err.to_string(),
                Some(&task.task_id.to_string()),
            );
            inner.events.publish_sync(
                names::TASK_COMPENSATION_FAILED,
                json!({ "task_id": task.task_id, "error": err.to_string() }),
            );
        }
    }
}

fn build_dispatch_table(workers: &[Arc<dyn Worker>]) -> Result<HashMap<TaskKind, usize>> {
    let mut table = HashMap::new();
    for kind in TaskKind::ALL {
        let probe = probe_task(kind);
        let matching: Vec<usize> = workers
            .iter()
            .enumerate()
            .filter(|(_, worker)| worker.matches(&probe))
            .map(|(index, _)| index)
            .collect();
        match matching.as_slice() {
            [index] => {
                table.insert(kind, *index);
            }
            [] => {
                return Err(FleetError::ConfigurationError(format!(
                    "no worker registered for task type {kind}"
                )))
            }
            many => {
                return Err(FleetError::ConfigurationError(format!(
                    "{} workers registered for task type {kind}, expected exactly one",
                    many.len()
                )))
            }
        }
    }
    Ok(table)
}

fn probe_task(kind: TaskKind) -> Task {
    match kind {
        TaskKind::CreateRegistry => Task::create_registry(String::new()),
        TaskKind::ScheduleRegistry => Task::schedule_registry(Uuid::nil()),
        TaskKind::ProvisionRegistryTenant => Task::provision_registry_tenant(Uuid::nil()),
        TaskKind::RegistryHeartbeat => Task::registry_heartbeat(Uuid::nil()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::worker::WorkerResult;
    use async_trait::async_trait;

    struct StubWorker {
        kind: TaskKind,
    }

    #[async_trait]
    impl Worker for StubWorker {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn matches(&self, task: &Task) -> bool {
            task.kind() == self.kind
        }

        async fn execute(&self, _task: &mut Task, _ctx: &mut WorkerContext<'_>) -> WorkerResult<()> {
            Ok(())
        }
    }

    fn stub_workers(kinds: &[TaskKind]) -> Vec<Arc<dyn Worker>> {
        kinds
            .iter()
            .map(|kind| Arc::new(StubWorker { kind: *kind }) as Arc<dyn Worker>)
            .collect()
    }

    #[test]
    fn test_dispatch_table_requires_exactly_one_worker_per_type() {
        let table = build_dispatch_table(&stub_workers(&TaskKind::ALL)).unwrap();
        assert_eq!(table.len(), TaskKind::ALL.len());
    }

    #[test]
    fn test_dispatch_table_rejects_missing_worker() {
        let workers = stub_workers(&[
            TaskKind::CreateRegistry,
            TaskKind::ScheduleRegistry,
            TaskKind::ProvisionRegistryTenant,
        ]);
        let err = build_dispatch_table(&workers).unwrap_err();
        assert!(matches!(err, FleetError::ConfigurationError(_)));
    }

    #[test]
    fn test_dispatch_table_rejects_duplicate_workers() {
        let mut workers = stub_workers(&TaskKind::ALL);
        workers.push(Arc::new(StubWorker {
            kind: TaskKind::RegistryHeartbeat,
        }));
        let err = build_dispatch_table(&workers).unwrap_err();
        assert!(matches!(err, FleetError::ConfigurationError(_)));
    }
}
