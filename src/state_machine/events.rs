use serde::{Deserialize, Serialize};

use super::states::RegistryState;

/// Events that can trigger registry state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RegistryEvent {
    /// A deployment was assigned to the registry
    Schedule,
    /// Tenant identity and URL were provisioned
    ProvisionTenant,
    /// A heartbeat confirmed the registry is reachable
    Confirm,
    /// The registry was abandoned with an error message
    Fail(String),
}

impl RegistryEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::ProvisionTenant => "provision_tenant",
            Self::Confirm => "confirm",
            Self::Fail(_) => "fail",
        }
    }

    /// The state this event transitions a registry into
    pub fn target_state(&self) -> RegistryState {
        match self {
            Self::Schedule => RegistryState::Scheduled,
            Self::ProvisionTenant => RegistryState::TenantProvisioned,
            Self::Confirm => RegistryState::Available,
            Self::Fail(_) => RegistryState::Failed,
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
