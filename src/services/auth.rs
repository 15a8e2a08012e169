//! Auth service SPI: tenant-scoped auth resources keyed by registry id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Auth resources provisioned for one registry tenant.
///
/// Transient value object; only its derived effects are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResource {
    pub server_url: String,
    pub client_id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Auth server unreachable or timed out
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
    /// The auth server rejected the request
    #[error("auth request rejected: {0}")]
    Rejected(String),
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[async_trait]
pub trait AuthService: Send + Sync + 'static {
    /// Create tenant-scoped auth resources keyed by registry id
    async fn create_tenant_auth_resources(
        &self,
        registry_id: &str,
        registry_url: &str,
    ) -> Result<AuthResource, AuthError>;

    /// Delete the auth resources for a registry; idempotent
    async fn delete_resources(&self, registry_id: &str) -> Result<(), AuthError>;
}
