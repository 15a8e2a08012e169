//! Tenant manager SPI: remote tenant lifecycle on a registry deployment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::registry::RegistryDeployment;

/// Address pair for the tenant manager of one deployment.
///
/// Transient value object constructed per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantManager {
    pub tenant_manager_url: String,
    pub registry_deployment_url: String,
}

impl TenantManager {
    pub fn from_deployment(deployment: &RegistryDeployment) -> Self {
        Self {
            tenant_manager_url: deployment.tenant_manager_url.clone(),
            registry_deployment_url: deployment.registry_deployment_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRequest {
    pub tenant_id: String,
    pub auth_server_url: String,
    pub auth_client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub auth_server_url: String,
    pub auth_client_id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TenantManagerError {
    /// Tenant manager unreachable or timed out
    #[error("tenant manager unreachable: {0}")]
    Unreachable(String),
    /// The tenant manager rejected the request
    #[error("tenant manager rejected request: {0}")]
    Rejected(String),
}

impl TenantManagerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

#[async_trait]
pub trait TenantManagerClient: Send + Sync + 'static {
    async fn create_tenant(
        &self,
        tenant_manager: &TenantManager,
        request: TenantRequest,
    ) -> Result<Tenant, TenantManagerError>;

    async fn get_all_tenants(
        &self,
        tenant_manager: &TenantManager,
    ) -> Result<Vec<Tenant>, TenantManagerError>;

    /// Delete a remote tenant; idempotent
    async fn delete_tenant(
        &self,
        tenant_manager: &TenantManager,
        tenant_id: &str,
    ) -> Result<(), TenantManagerError>;

    /// Health probe for the deployment's tenant manager
    async fn ping_tenant_manager(&self, tenant_manager: &TenantManager) -> bool;

    /// Health probe for one tenant
    async fn ping_tenant(&self, tenant_manager: &TenantManager, tenant_id: &str) -> bool;
}
