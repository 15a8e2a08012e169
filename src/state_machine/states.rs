use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry provisioning state definitions.
///
/// The textual values are the ones persisted on the registry's status
/// sub-record, starting at `PROVISIONING` when the create worker first
/// writes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryState {
    /// Registry row exists, no deployment assigned yet
    Provisioning,
    /// Deployment assigned, tenant not yet provisioned
    Scheduled,
    /// Tenant id and registry URL are set
    TenantProvisioned,
    /// Confirmed reachable by a heartbeat
    Available,
    /// Abandoned after compensation
    Failed,
}

impl RegistryState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if the registry has been confirmed reachable
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Check whether a transition to `target` is allowed
    pub fn can_transition_to(&self, target: RegistryState) -> bool {
        matches!(
            (self, target),
            (Self::Provisioning, Self::Scheduled)
                | (Self::Scheduled, Self::TenantProvisioned)
                | (Self::TenantProvisioned, Self::Available)
                | (Self::Provisioning, Self::Failed)
                | (Self::Scheduled, Self::Failed)
                | (Self::TenantProvisioned, Self::Failed)
                | (Self::Available, Self::Failed)
        )
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "PROVISIONING"),
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::TenantProvisioned => write!(f, "TENANT_PROVISIONED"),
            Self::Available => write!(f, "AVAILABLE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for RegistryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROVISIONING" => Ok(Self::Provisioning),
            "SCHEDULED" => Ok(Self::Scheduled),
            "TENANT_PROVISIONED" => Ok(Self::TenantProvisioned),
            "AVAILABLE" => Ok(Self::Available),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid registry state: {s}")),
        }
    }
}

/// Default state for newly created registries
impl Default for RegistryState {
    fn default() -> Self {
        Self::Provisioning
    }
}
