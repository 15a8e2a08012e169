//! Registry data layer: the fleet-managed resource representing one registry
//! instance across its provisioning lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DeploymentTarget;
use crate::state_machine::RegistryState;

/// Status sub-record: textual state plus last-updated timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub value: RegistryState,
    pub last_updated: DateTime<Utc>,
}

impl RegistryStatus {
    pub fn provisioning() -> Self {
        Self {
            value: RegistryState::Provisioning,
            last_updated: Utc::now(),
        }
    }
}

/// Reference to the target cluster deployment a registry was scheduled onto.
///
/// Exposes the deployment base URL and the tenant-manager endpoint for that
/// deployment. Set by scheduling, read by tenant provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDeployment {
    pub name: String,
    pub registry_deployment_url: String,
    pub tenant_manager_url: String,
}

impl From<DeploymentTarget> for RegistryDeployment {
    fn from(target: DeploymentTarget) -> Self {
        Self {
            name: target.name,
            registry_deployment_url: target.registry_deployment_url,
            tenant_manager_url: target.tenant_manager_url,
        }
    }
}

/// One registry instance across its provisioning lifecycle.
///
/// Invariant: `tenant_id` is set if and only if `registry_url` is valid if
/// and only if tenant provisioning committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub id: Uuid,
    pub name: String,
    pub status: RegistryStatus,
    /// Set once scheduling assigns a deployment
    pub deployment: Option<RegistryDeployment>,
    /// Set only when tenant provisioning commits
    pub tenant_id: Option<String>,
    /// Derived from the deployment URL and tenant id
    pub registry_url: Option<String>,
    /// Optimistic lock counter, owned by storage
    pub version: i64,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: RegistryStatus::provisioning(),
            deployment: None,
            tenant_id: None,
            registry_url: None,
            version: 0,
        }
    }

    /// Refresh the status timestamp
    pub fn touch(&mut self) {
        self.status.last_updated = Utc::now();
    }

    /// Whether tenant provisioning has durably committed for this registry
    pub fn has_committed_tenant(&self) -> bool {
        self.tenant_id.is_some()
    }
}
