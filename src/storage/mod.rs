//! # Resource Storage SPI
//!
//! Transactional storage contract for Registry rows. The engine wraps every
//! worker attempt in one session obtained from [`ResourceStorage::begin`];
//! all writes staged on the session commit together or not at all.
//!
//! Only the conflict-signaling contract is part of the core:
//! [`StorageError::Conflict`] on a concurrent write to the same Registry row
//! and [`StorageError::NotFound`] on deleting an absent row. Both are
//! distinct signals and neither may be masked by callers.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::FleetError;
use crate::models::registry::Registry;

pub use memory::InMemoryStorage;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// A concurrent writer committed the same Registry row first
    #[error("conflicting concurrent write to registry {id}")]
    Conflict { id: Uuid },
    /// The Registry row does not exist
    #[error("registry {id} not found")]
    NotFound { id: Uuid },
    /// Backend failure unrelated to the optimistic contract
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    /// Conflicts resolve through retry; the other variants are surfaced as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<StorageError> for FleetError {
    fn from(err: StorageError) -> Self {
        FleetError::StorageError(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage SPI handed to the engine at construction.
#[async_trait]
pub trait ResourceStorage: Send + Sync + 'static {
    /// Open a transactional session
    async fn begin(&self) -> StorageResult<Box<dyn StorageTransaction>>;
}

/// One transactional session over Registry rows.
///
/// Writes are staged until [`commit`](StorageTransaction::commit); a rollback
/// or drop discards them. Reads observe the session's own staged writes.
#[async_trait]
pub trait StorageTransaction: Send {
    async fn get_registry_by_id(&mut self, id: Uuid) -> StorageResult<Option<Registry>>;

    /// Insert or update a Registry row.
    ///
    /// Fails with [`StorageError::Conflict`] when the row was committed by a
    /// concurrent writer after this session first observed it.
    async fn create_or_update_registry(&mut self, registry: Registry) -> StorageResult<Registry>;

    /// Delete a Registry row; fails with [`StorageError::NotFound`] if absent
    async fn delete_registry(&mut self, id: Uuid) -> StorageResult<()>;

    /// Revalidate optimistic versions and apply all staged writes atomically
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discard all staged writes
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
