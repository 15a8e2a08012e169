//! In-memory [`ResourceStorage`] implementation with per-row optimistic
//! version counters. Backs tests and embedded use; a relational backend
//! satisfies the same session contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ResourceStorage, StorageError, StorageResult, StorageTransaction};
use crate::models::registry::Registry;

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    rows: Arc<RwLock<HashMap<Uuid, Registry>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a committed row outside any transaction
    pub fn committed(&self, id: Uuid) -> Option<Registry> {
        self.rows.read().get(&id).cloned()
    }

    /// Snapshot of all committed rows
    pub fn committed_rows(&self) -> Vec<Registry> {
        self.rows.read().values().cloned().collect()
    }
}

#[async_trait]
impl ResourceStorage for InMemoryStorage {
    async fn begin(&self) -> StorageResult<Box<dyn StorageTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            rows: self.rows.clone(),
            observed: HashMap::new(),
            staged: HashMap::new(),
        }))
    }
}

enum StagedWrite {
    Upsert(Registry),
    Delete,
}

struct InMemoryTransaction {
    rows: Arc<RwLock<HashMap<Uuid, Registry>>>,
    /// Committed version at this session's first contact; None = observed absent
    observed: HashMap<Uuid, Option<i64>>,
    staged: HashMap<Uuid, StagedWrite>,
}

impl InMemoryTransaction {
    fn observe(&mut self, id: Uuid) -> Option<i64> {
        let version = self.rows.read().get(&id).map(|r| r.version);
        *self.observed.entry(id).or_insert(version)
    }
}

#[async_trait]
impl StorageTransaction for InMemoryTransaction {
    async fn get_registry_by_id(&mut self, id: Uuid) -> StorageResult<Option<Registry>> {
        if let Some(write) = self.staged.get(&id) {
            return Ok(match write {
                StagedWrite::Upsert(registry) => Some(registry.clone()),
                StagedWrite::Delete => None,
            });
        }
        self.observe(id);
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn create_or_update_registry(&mut self, registry: Registry) -> StorageResult<Registry> {
        let id = registry.id;
        let observed = self.observe(id);
        let committed = self.rows.read().get(&id).map(|r| r.version);
        if committed != observed {
            return Err(StorageError::Conflict { id });
        }
        self.staged.insert(id, StagedWrite::Upsert(registry.clone()));
        Ok(registry)
    }

    async fn delete_registry(&mut self, id: Uuid) -> StorageResult<()> {
        let exists = match self.staged.get(&id) {
            Some(StagedWrite::Upsert(_)) => true,
            Some(StagedWrite::Delete) => false,
            None => {
                self.observe(id);
                self.rows.read().contains_key(&id)
            }
        };
        if !exists {
            return Err(StorageError::NotFound { id });
        }
        self.staged.insert(id, StagedWrite::Delete);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let InMemoryTransaction {
            rows,
            observed,
            staged,
        } = *self;

        let mut guard = rows.write();
        for (id, observed_version) in &observed {
            let committed = guard.get(id).map(|r| r.version);
            if committed != *observed_version {
                return Err(StorageError::Conflict { id: *id });
            }
        }
        for (id, write) in staged {
            match write {
                StagedWrite::Upsert(mut registry) => {
                    registry.version = guard.get(&id).map(|r| r.version + 1).unwrap_or(1);
                    guard.insert(id, registry);
                }
                StagedWrite::Delete => {
                    guard.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
