//! Worker for `CREATE_REGISTRY` tasks: persists a new Registry in
//! `PROVISIONING` status and chains the scheduling step.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::execution::task::{Task, TaskKind, TaskType};
use crate::execution::task_enqueuer::TaskEnqueuer;
use crate::execution::worker::{Worker, WorkerContext, WorkerError, WorkerResult};
use crate::models::registry::Registry;

pub struct CreateRegistryWorker {
    enqueuer: Arc<TaskEnqueuer>,
}

impl CreateRegistryWorker {
    pub fn new(enqueuer: Arc<TaskEnqueuer>) -> Self {
        Self { enqueuer }
    }
}

#[async_trait]
impl Worker for CreateRegistryWorker {
    fn name(&self) -> &'static str {
        "create-registry"
    }

    fn matches(&self, task: &Task) -> bool {
        task.kind() == TaskKind::CreateRegistry
    }

    async fn execute(&self, task: &mut Task, ctx: &mut WorkerContext<'_>) -> WorkerResult<()> {
        let TaskType::CreateRegistry { name } = &task.task_type else {
            return Err(WorkerError::InvalidPayload(format!(
                "create-registry worker dispatched {} task",
                task.kind()
            )));
        };

        let registry = Registry::new(name.clone());
        let registry = ctx.tx().create_or_update_registry(registry).await?;

        info!(
            registry_id = %registry.id,
            name = %registry.name,
            "registry created in provisioning state"
        );

        // Scheduling must only become dispatchable once this row is durable
        let enqueuer = self.enqueuer.clone();
        let registry_id = registry.id;
        ctx.delay(move || enqueuer.submit(Task::schedule_registry(registry_id)));
        Ok(())
    }
}
