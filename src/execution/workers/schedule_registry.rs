//! Worker for `SCHEDULE_REGISTRY` tasks: assigns a deployment target to a
//! registry and chains tenant provisioning.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::DeploymentTarget;
use crate::execution::task::{Task, TaskKind, TaskType};
use crate::execution::task_enqueuer::TaskEnqueuer;
use crate::execution::worker::{Worker, WorkerContext, WorkerError, WorkerResult};
use crate::models::registry::RegistryDeployment;
use crate::state_machine::{self, RegistryEvent};

pub struct ScheduleRegistryWorker {
    deployments: Vec<DeploymentTarget>,
    cursor: AtomicUsize,
    enqueuer: Arc<TaskEnqueuer>,
}

impl ScheduleRegistryWorker {
    pub fn new(deployments: Vec<DeploymentTarget>, enqueuer: Arc<TaskEnqueuer>) -> Self {
        Self {
            deployments,
            cursor: AtomicUsize::new(0),
            enqueuer,
        }
    }

    fn next_target(&self) -> Option<&DeploymentTarget> {
        if self.deployments.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.deployments.len();
        Some(&self.deployments[index])
    }
}

#[async_trait]
impl Worker for ScheduleRegistryWorker {
    fn name(&self) -> &'static str {
        "schedule-registry"
    }

    fn matches(&self, task: &Task) -> bool {
        task.kind() == TaskKind::ScheduleRegistry
    }

    async fn execute(&self, task: &mut Task, ctx: &mut WorkerContext<'_>) -> WorkerResult<()> {
        let TaskType::ScheduleRegistry { registry_id } = task.task_type else {
            return Err(WorkerError::InvalidPayload(format!(
                "schedule-registry worker dispatched {} task",
                task.kind()
            )));
        };

        let Some(mut registry) = ctx.tx().get_registry_by_id(registry_id).await? else {
            // The create transaction may not have committed yet
            return Err(ctx.retry("registry not visible yet"));
        };

        if registry.deployment.is_some() {
            debug!(registry_id = %registry_id, "registry already scheduled");
            return Ok(());
        }

        let Some(target) = self.next_target() else {
            return Err(WorkerError::Configuration(
                "no deployment targets configured".to_string(),
            ));
        };

        registry.deployment = Some(RegistryDeployment::from(target.clone()));
        registry.status.value = state_machine::apply(registry.status.value, &RegistryEvent::Schedule)?;
        registry.touch();
        let registry = ctx.tx().create_or_update_registry(registry).await?;

        info!(
            registry_id = %registry.id,
            deployment = %target.name,
            "registry scheduled onto deployment"
        );

        let enqueuer = self.enqueuer.clone();
        ctx.delay(move || enqueuer.submit(Task::provision_registry_tenant(registry_id)));
        Ok(())
    }

    async fn compensate(
        &self,
        task: &mut Task,
        ctx: &mut WorkerContext<'_>,
        _error: Option<&WorkerError>,
    ) -> WorkerResult<()> {
        let TaskType::ScheduleRegistry { registry_id } = task.task_type else {
            return Ok(());
        };

        let Some(registry) = ctx.tx().get_registry_by_id(registry_id).await? else {
            return Ok(());
        };

        // Success state: a deployment was durably assigned
        if registry.deployment.is_some() {
            return Ok(());
        }

        // A registry that could not be scheduled is discarded
        ctx.tx().delete_registry(registry.id).await?;
        info!(registry_id = %registry_id, "unscheduled registry discarded");
        Ok(())
    }
}
