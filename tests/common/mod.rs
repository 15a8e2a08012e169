//! Shared test harness: scriptable auth/tenant-manager doubles, a fault
//! injection storage wrapper, and an engine builder over in-memory storage.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use fleet_core::config::{BackoffConfig, DeploymentTarget, FleetConfig};
use fleet_core::execution::{Task, TaskKind, TaskManager, Worker, WorkerContext, WorkerResult};
use fleet_core::models::Registry;
use fleet_core::services::auth::{AuthError, AuthResource, AuthService};
use fleet_core::services::tenant_manager::{
    Tenant, TenantManager, TenantManagerClient, TenantManagerError, TenantRequest,
};
use fleet_core::state_machine::RegistryState;
use fleet_core::storage::{InMemoryStorage, ResourceStorage, StorageResult, StorageTransaction};

pub const DEPLOYMENT_URL: &str = "https://registry.test.example.com";
pub const TENANT_MANAGER_URL: &str = "https://tenants.test.example.com";

/// Call-recording auth service double with scriptable failures.
#[derive(Default)]
pub struct MockAuthService {
    live_resources: Mutex<HashSet<String>>,
    pub create_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    /// Fail this many create calls with a transient error before succeeding
    pub fail_creates_remaining: AtomicU32,
}

impl MockAuthService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn has_resources(&self, registry_id: &str) -> bool {
        self.live_resources.lock().contains(registry_id)
    }

    pub fn live_resource_count(&self) -> usize {
        self.live_resources.lock().len()
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn create_tenant_auth_resources(
        &self,
        registry_id: &str,
        _registry_url: &str,
    ) -> Result<AuthResource, AuthError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_creates_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AuthError::Unavailable("injected auth outage".to_string()));
        }
        self.live_resources.lock().insert(registry_id.to_string());
        Ok(AuthResource {
            server_url: "https://auth.test.example.com".to_string(),
            client_id: format!("registry-{registry_id}"),
        })
    }

    async fn delete_resources(&self, registry_id: &str) -> Result<(), AuthError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.live_resources.lock().remove(registry_id);
        Ok(())
    }
}

/// Call-recording tenant manager double with scriptable failures.
#[derive(Default)]
pub struct MockTenantManagerClient {
    tenants: Mutex<HashMap<String, Tenant>>,
    pub create_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    /// Fail this many create calls with a transient error before succeeding
    pub fail_creates_remaining: AtomicU32,
    /// Reject every create call with a permanent error
    pub reject_creates: AtomicBool,
    /// Health probe results
    pub ping_ok: AtomicBool,
}

impl MockTenantManagerClient {
    pub fn new() -> Arc<Self> {
        let client = Self::default();
        client.ping_ok.store(true, Ordering::SeqCst);
        Arc::new(client)
    }

    pub fn tenant(&self, tenant_id: &str) -> Option<Tenant> {
        self.tenants.lock().get(tenant_id).cloned()
    }

    /// Pretend a tenant already exists remotely (e.g. created by an earlier
    /// attempt before a crash)
    pub fn seed_tenant(&self, tenant_id: &str) {
        self.tenants.lock().insert(
            tenant_id.to_string(),
            Tenant {
                tenant_id: tenant_id.to_string(),
                auth_server_url: "https://auth.test.example.com".to_string(),
                auth_client_id: format!("registry-{tenant_id}"),
            },
        );
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.lock().len()
    }
}

#[async_trait]
impl TenantManagerClient for MockTenantManagerClient {
    async fn create_tenant(
        &self,
        _tenant_manager: &TenantManager,
        request: TenantRequest,
    ) -> Result<Tenant, TenantManagerError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(TenantManagerError::Rejected(
                "injected tenant rejection".to_string(),
            ));
        }
        if self
            .fail_creates_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TenantManagerError::Unreachable(
                "injected tenant manager outage".to_string(),
            ));
        }
        let tenant = Tenant {
            tenant_id: request.tenant_id.clone(),
            auth_server_url: request.auth_server_url,
            auth_client_id: request.auth_client_id,
        };
        self.tenants.lock().insert(request.tenant_id, tenant.clone());
        Ok(tenant)
    }

    async fn get_all_tenants(
        &self,
        _tenant_manager: &TenantManager,
    ) -> Result<Vec<Tenant>, TenantManagerError> {
        Ok(self.tenants.lock().values().cloned().collect())
    }

    async fn delete_tenant(
        &self,
        _tenant_manager: &TenantManager,
        tenant_id: &str,
    ) -> Result<(), TenantManagerError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.tenants.lock().remove(tenant_id);
        Ok(())
    }

    async fn ping_tenant_manager(&self, _tenant_manager: &TenantManager) -> bool {
        self.ping_ok.load(Ordering::SeqCst)
    }

    async fn ping_tenant(&self, _tenant_manager: &TenantManager, tenant_id: &str) -> bool {
        self.ping_ok.load(Ordering::SeqCst) && self.tenants.lock().contains_key(tenant_id)
    }
}

/// Storage wrapper that injects a backend failure on the nth registry upsert
/// (1-based) across all sessions.
pub struct FlakyStorage {
    inner: InMemoryStorage,
    upsert_calls: Arc<AtomicU32>,
    fail_upsert_call: u32,
}

impl FlakyStorage {
    pub fn failing_upsert_number(inner: InMemoryStorage, fail_upsert_call: u32) -> Self {
        Self {
            inner,
            upsert_calls: Arc::new(AtomicU32::new(0)),
            fail_upsert_call,
        }
    }
}

#[async_trait]
impl ResourceStorage for FlakyStorage {
    async fn begin(&self) -> StorageResult<Box<dyn StorageTransaction>> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            upsert_calls: self.upsert_calls.clone(),
            fail_upsert_call: self.fail_upsert_call,
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn StorageTransaction>,
    upsert_calls: Arc<AtomicU32>,
    fail_upsert_call: u32,
}

#[async_trait]
impl StorageTransaction for FlakyTransaction {
    async fn get_registry_by_id(&mut self, id: Uuid) -> StorageResult<Option<Registry>> {
        self.inner.get_registry_by_id(id).await
    }

    async fn create_or_update_registry(&mut self, registry: Registry) -> StorageResult<Registry> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_upsert_call {
            return Err(fleet_core::storage::StorageError::Backend(
                "injected storage failure".to_string(),
            ));
        }
        self.inner.create_or_update_registry(registry).await
    }

    async fn delete_registry(&mut self, id: Uuid) -> StorageResult<()> {
        self.inner.delete_registry(id).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.inner.rollback().await
    }
}

/// No-op worker used to satisfy the one-worker-per-type dispatch rule when a
/// test pins down a single pipeline stage.
pub struct StubWorker {
    kind: TaskKind,
}

impl StubWorker {
    pub fn owning(kind: TaskKind) -> Arc<dyn Worker> {
        Arc::new(Self { kind })
    }
}

#[async_trait]
impl Worker for StubWorker {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn matches(&self, task: &Task) -> bool {
        task.kind() == self.kind
    }

    async fn execute(&self, _task: &mut Task, _ctx: &mut WorkerContext<'_>) -> WorkerResult<()> {
        Ok(())
    }
}

/// Engine configuration tuned for fast test turnaround
pub fn test_config() -> FleetConfig {
    let mut config = FleetConfig::default().with_deployment(DeploymentTarget::new(
        "test-cluster",
        DEPLOYMENT_URL,
        TENANT_MANAGER_URL,
    ));
    config.task_attempts_max = 4;
    config.backoff = BackoffConfig {
        base_delay_ms: 5,
        max_delay_ms: 20,
        multiplier: 2.0,
        jitter_enabled: false,
        max_jitter: 0.0,
    };
    config
}

pub struct TestFleet {
    pub storage: InMemoryStorage,
    pub auth: Arc<MockAuthService>,
    pub tenants: Arc<MockTenantManagerClient>,
    pub manager: TaskManager,
}

/// Build and start an engine with the production pipeline workers over
/// in-memory storage and the mock collaborators.
pub async fn started_fleet() -> TestFleet {
    started_fleet_with(test_config()).await
}

pub async fn started_fleet_with(config: FleetConfig) -> TestFleet {
    let storage = InMemoryStorage::new();
    let auth = MockAuthService::new();
    let tenants = MockTenantManagerClient::new();
    let manager = TaskManager::with_default_workers(
        Arc::new(storage.clone()),
        auth.clone(),
        tenants.clone(),
        config,
    )
    .expect("engine construction");
    manager.start().await.expect("engine start");
    TestFleet {
        storage,
        auth,
        tenants,
        manager,
    }
}

/// Commit a registry row outside the engine
pub async fn seed_registry(storage: &InMemoryStorage, registry: Registry) -> Registry {
    let id = registry.id;
    let mut tx = storage.begin().await.unwrap();
    tx.create_or_update_registry(registry).await.unwrap();
    tx.commit().await.unwrap();
    storage.committed(id).unwrap()
}

/// Poll until some committed registry reaches the given state
pub async fn wait_for_registry_state(
    storage: &InMemoryStorage,
    state: RegistryState,
    timeout: Duration,
) -> Option<Registry> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(registry) = storage
            .committed_rows()
            .into_iter()
            .find(|registry| registry.status.value == state)
        {
            return Some(registry);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// First task of the given kind in the engine's task table
pub fn find_task_of_kind(manager: &TaskManager, kind: TaskKind) -> Option<Task> {
    manager.tasks().into_iter().find(|task| task.kind() == kind)
}

/// Poll until a task of the given kind exists and is terminal
pub async fn wait_for_terminal_task_of_kind(
    manager: &TaskManager,
    kind: TaskKind,
    timeout: Duration,
) -> Option<Task> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(task) = find_task_of_kind(manager, kind) {
            if task.status.is_terminal() {
                return Some(task);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
