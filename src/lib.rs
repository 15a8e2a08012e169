#![allow(clippy::doc_markdown)] // Allow technical terms like URLs, UUIDs in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fleet Core
//!
//! Asynchronous task-execution core of a fleet manager that provisions and
//! lifecycle-manages tenant-isolated registry instances across clusters.
//!
//! ## Overview
//!
//! Provisioning a registry is a multi-step, failure-prone workflow: create
//! the registry record, schedule it onto a cluster deployment, provision its
//! tenant identity against remote auth and tenant-manager services, and
//! confirm it with a heartbeat. This crate executes that workflow as durable
//! tasks with transactional state transitions, bounded retry of transient
//! failures, and compensating rollback of partially completed work, so a
//! registry always reaches a consistent terminal state without orphaned
//! remote resources or double-provisioned tenants.
//!
//! ## Module Organization
//!
//! - [`execution`] - Task engine: dispatch, retry/backoff, compensation
//! - [`models`] - Registry data layer
//! - [`state_machine`] - Registry provisioning state management
//! - [`storage`] - Transactional storage SPI with the conflict contract
//! - [`services`] - Auth and tenant-manager SPIs
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fleet_core::config::{DeploymentTarget, FleetConfig};
//! use fleet_core::execution::{Task, TaskManager};
//! use fleet_core::storage::InMemoryStorage;
//! # use fleet_core::services::auth::AuthService;
//! # use fleet_core::services::tenant_manager::TenantManagerClient;
//!
//! # async fn example(
//! #     auth: Arc<dyn AuthService>,
//! #     tenant_manager: Arc<dyn TenantManagerClient>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = FleetConfig::default().with_deployment(DeploymentTarget::new(
//!     "eu-west-1",
//!     "https://registry.eu-west-1.example.com",
//!     "https://tenants.eu-west-1.example.com",
//! ));
//!
//! let manager = TaskManager::with_default_workers(
//!     Arc::new(InMemoryStorage::new()),
//!     auth,
//!     tenant_manager,
//!     config,
//! )?;
//! manager.start().await?;
//!
//! // Fire-and-forget: the pipeline runs create → schedule → provision →
//! // heartbeat, retrying transient failures and compensating terminal ones.
//! manager.submit(Task::create_registry("analytics-prod"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod models;
pub mod services;
pub mod state_machine;
pub mod storage;

pub use config::{BackoffConfig, DeploymentTarget, FleetConfig};
pub use error::{FleetError, Result};
pub use events::EventPublisher;
pub use execution::{
    Task, TaskKind, TaskManager, TaskStatus, TaskType, Worker, WorkerContext, WorkerError,
};
pub use models::{Registry, RegistryDeployment, RegistryStatus};
pub use services::{AuthResource, AuthService, TenantManager, TenantManagerClient};
pub use state_machine::RegistryState;
pub use storage::{InMemoryStorage, ResourceStorage, StorageError, StorageTransaction};
