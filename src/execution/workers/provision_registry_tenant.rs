//! Worker for `PROVISION_REGISTRY_TENANT` tasks.
//!
//! Forward logic provisions the tenant identity for a scheduled registry:
//! generate (or reuse) the tenant id, derive the registry URL, create auth
//! resources, create the remote tenant, persist the registry, and chain a
//! heartbeat. The generated tenant id is written back onto the task payload
//! the moment the remote create succeeds; that durable marker keeps retries
//! from double-provisioning and tells compensation a remote tenant exists.
//!
//! Compensation infers everything from persisted state and unwinds in
//! reverse order: remote tenant, auth resources, then the registry row
//! itself. A non-resumable failed attempt is discarded entirely.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::execution::task::{Task, TaskKind, TaskType};
use crate::execution::task_enqueuer::TaskEnqueuer;
use crate::execution::worker::{Worker, WorkerContext, WorkerError, WorkerResult};
use crate::services::auth::AuthService;
use crate::services::tenant_manager::{TenantManager, TenantManagerClient, TenantRequest};
use crate::state_machine::{self, RegistryEvent};

pub struct ProvisionRegistryTenantWorker {
    auth: Arc<dyn AuthService>,
    tenants: Arc<dyn TenantManagerClient>,
    enqueuer: Arc<TaskEnqueuer>,
}

impl ProvisionRegistryTenantWorker {
    pub fn new(
        auth: Arc<dyn AuthService>,
        tenants: Arc<dyn TenantManagerClient>,
        enqueuer: Arc<TaskEnqueuer>,
    ) -> Self {
        Self {
            auth,
            tenants,
            enqueuer,
        }
    }
}

#[async_trait]
impl Worker for ProvisionRegistryTenantWorker {
    fn name(&self) -> &'static str {
        "provision-registry-tenant"
    }

    fn matches(&self, task: &Task) -> bool {
        task.kind() == TaskKind::ProvisionRegistryTenant
    }

    async fn execute(&self, task: &mut Task, ctx: &mut WorkerContext<'_>) -> WorkerResult<()> {
        let TaskType::ProvisionRegistryTenant {
            registry_id,
            registry_tenant_id,
        } = task.task_type.clone()
        else {
            return Err(WorkerError::InvalidPayload(format!(
                "provision-registry-tenant worker dispatched {} task",
                task.kind()
            )));
        };

        let Some(mut registry) = ctx.tx().get_registry_by_id(registry_id).await? else {
            // The create transaction may not have committed yet
            return Err(ctx.retry("registry not visible yet"));
        };

        let Some(deployment) = registry.deployment.clone() else {
            // Either the schedule task didn't run yet, or we are in trouble
            return Err(ctx.retry("registry has no deployment assigned yet"));
        };

        // Reusing a carried tenant id keeps retried attempts from creating
        // orphan tenants
        let newly_generated = registry_tenant_id.is_none();
        let tenant_id = registry_tenant_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let registry_url = format!("{}/t/{}", deployment.registry_deployment_url, tenant_id);
        registry.tenant_id = Some(tenant_id.clone());
        registry.registry_url = Some(registry_url.clone());

        let auth_resource = self
            .auth
            .create_tenant_auth_resources(&registry.id.to_string(), &registry_url)
            .await?;

        if newly_generated {
            let tenant_manager = TenantManager::from_deployment(&deployment);
            let request = TenantRequest {
                tenant_id: tenant_id.clone(),
                auth_server_url: auth_resource.server_url,
                auth_client_id: auth_resource.client_id,
            };
            self.tenants.create_tenant(&tenant_manager, request).await?;

            // Durable marker: a remote tenant exists from here on
            if let TaskType::ProvisionRegistryTenant {
                registry_tenant_id, ..
            } = &mut task.task_type
            {
                *registry_tenant_id = Some(tenant_id.clone());
            }
        } else {
            debug!(
                registry_id = %registry_id,
                tenant_id = %tenant_id,
                "remote tenant already created on a previous attempt"
            );
        }

        registry.status.value =
            state_machine::apply(registry.status.value, &RegistryEvent::ProvisionTenant)?;
        registry.touch();
        // A conflict here is a hard failure surfaced to the engine
        let registry = ctx.tx().create_or_update_registry(registry).await?;

        info!(
            registry_id = %registry.id,
            tenant_id = %tenant_id,
            registry_url = %registry_url,
            "registry tenant provisioned"
        );

        // Confirm availability as soon as this transaction is durable
        let enqueuer = self.enqueuer.clone();
        ctx.delay(move || enqueuer.submit(Task::registry_heartbeat(registry_id)));
        Ok(())
    }

    async fn compensate(
        &self,
        task: &mut Task,
        ctx: &mut WorkerContext<'_>,
        _error: Option<&WorkerError>,
    ) -> WorkerResult<()> {
        let TaskType::ProvisionRegistryTenant {
            registry_id,
            registry_tenant_id,
        } = task.task_type.clone()
        else {
            return Err(WorkerError::InvalidPayload(format!(
                "provision-registry-tenant worker compensating {} task",
                task.kind()
            )));
        };

        let registry = ctx.tx().get_registry_by_id(registry_id).await?;

        // Success state: the tenant provisioning transaction committed
        if let Some(registry) = &registry {
            if registry.has_committed_tenant() {
                return Ok(());
            }
        }

        // Handle failures in reverse order
        if let Some(registry) = registry {
            if let (Some(deployment), Some(tenant_id)) =
                (registry.deployment.as_ref(), registry_tenant_id.as_ref())
            {
                let tenant_manager = TenantManager::from_deployment(deployment);
                self.tenants.delete_tenant(&tenant_manager, tenant_id).await?;
                info!(
                    registry_id = %registry_id,
                    tenant_id = %tenant_id,
                    "orphan remote tenant deleted"
                );
            }

            // Auth resources may exist even when the remote create never
            // happened; deletion is idempotent
            self.auth.delete_resources(&registry.id.to_string()).await?;

            ctx.tx().delete_registry(registry.id).await?;
            info!(registry_id = %registry_id, "unprovisioned registry discarded");
        }
        Ok(())
    }
}
