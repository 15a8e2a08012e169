//! Worker for `REGISTRY_HEARTBEAT` tasks: confirms a provisioned registry
//! is reachable and moves it to `AVAILABLE`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::execution::task::{Task, TaskKind, TaskType};
use crate::execution::worker::{Worker, WorkerContext, WorkerError, WorkerResult};
use crate::services::tenant_manager::{TenantManager, TenantManagerClient};
use crate::state_machine::{self, RegistryEvent, RegistryState};

pub struct RegistryHeartbeatWorker {
    tenants: Arc<dyn TenantManagerClient>,
}

impl RegistryHeartbeatWorker {
    pub fn new(tenants: Arc<dyn TenantManagerClient>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl Worker for RegistryHeartbeatWorker {
    fn name(&self) -> &'static str {
        "registry-heartbeat"
    }

    fn matches(&self, task: &Task) -> bool {
        task.kind() == TaskKind::RegistryHeartbeat
    }

    async fn execute(&self, task: &mut Task, ctx: &mut WorkerContext<'_>) -> WorkerResult<()> {
        let TaskType::RegistryHeartbeat { registry_id } = task.task_type else {
            return Err(WorkerError::InvalidPayload(format!(
                "registry-heartbeat worker dispatched {} task",
                task.kind()
            )));
        };

        let Some(mut registry) = ctx.tx().get_registry_by_id(registry_id).await? else {
            return Err(ctx.retry("registry not visible yet"));
        };

        if registry.status.value == RegistryState::Available {
            return Ok(());
        }

        let Some(deployment) = registry.deployment.clone() else {
            return Err(ctx.retry("registry has no deployment assigned yet"));
        };
        let Some(tenant_id) = registry.tenant_id.clone() else {
            return Err(ctx.retry("registry tenant not provisioned yet"));
        };

        let tenant_manager = TenantManager::from_deployment(&deployment);
        if !self.tenants.ping_tenant_manager(&tenant_manager).await {
            return Err(ctx.retry("tenant manager unreachable"));
        }
        if !self.tenants.ping_tenant(&tenant_manager, &tenant_id).await {
            return Err(ctx.retry("tenant not reachable yet"));
        }

        registry.status.value =
            state_machine::apply(registry.status.value, &RegistryEvent::Confirm)?;
        registry.touch();
        ctx.tx().create_or_update_registry(registry).await?;

        info!(registry_id = %registry_id, "registry confirmed available");
        Ok(())
    }

    async fn compensate(
        &self,
        task: &mut Task,
        ctx: &mut WorkerContext<'_>,
        error: Option<&WorkerError>,
    ) -> WorkerResult<()> {
        let TaskType::RegistryHeartbeat { registry_id } = task.task_type else {
            return Ok(());
        };

        let Some(mut registry) = ctx.tx().get_registry_by_id(registry_id).await? else {
            return Ok(());
        };

        // Success state: the heartbeat confirmed availability. An already
        // terminal registry is left alone so compensation stays idempotent.
        if registry.status.value == RegistryState::Available || registry.status.value.is_terminal()
        {
            return Ok(());
        }

        // The registry is fully provisioned but unconfirmed; keep the row
        // and surface the failure through its persisted state
        let reason = error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "heartbeat exhausted its retries".to_string());
        warn!(registry_id = %registry_id, reason = %reason, "marking unconfirmed registry failed");
        registry.status.value = state_machine::apply(
            registry.status.value,
            &RegistryEvent::fail_with_error(reason),
        )?;
        registry.touch();
        ctx.tx().create_or_update_registry(registry).await?;
        Ok(())
    }
}
