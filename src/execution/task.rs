//! Task data model: a durable unit of asynchronous work with a type and
//! payload, exclusively owned and mutated by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tagged task variant with its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    CreateRegistry {
        name: String,
    },
    ScheduleRegistry {
        registry_id: Uuid,
    },
    ProvisionRegistryTenant {
        registry_id: Uuid,
        /// Durable marker that a remote tenant create already succeeded.
        /// Written back by the provision worker, read by retries and
        /// compensation.
        registry_tenant_id: Option<String>,
    },
    RegistryHeartbeat {
        registry_id: Uuid,
    },
}

impl TaskType {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::CreateRegistry { .. } => TaskKind::CreateRegistry,
            Self::ScheduleRegistry { .. } => TaskKind::ScheduleRegistry,
            Self::ProvisionRegistryTenant { .. } => TaskKind::ProvisionRegistryTenant,
            Self::RegistryHeartbeat { .. } => TaskKind::RegistryHeartbeat,
        }
    }

    /// The registry this task targets, if any
    pub fn registry_id(&self) -> Option<Uuid> {
        match self {
            Self::CreateRegistry { .. } => None,
            Self::ScheduleRegistry { registry_id }
            | Self::ProvisionRegistryTenant { registry_id, .. }
            | Self::RegistryHeartbeat { registry_id } => Some(*registry_id),
        }
    }
}

/// Payload-free discriminant used as the worker dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    CreateRegistry,
    ScheduleRegistry,
    ProvisionRegistryTenant,
    RegistryHeartbeat,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::CreateRegistry,
        TaskKind::ScheduleRegistry,
        TaskKind::ProvisionRegistryTenant,
        TaskKind::RegistryHeartbeat,
    ];
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateRegistry => write!(f, "CREATE_REGISTRY"),
            Self::ScheduleRegistry => write!(f, "SCHEDULE_REGISTRY"),
            Self::ProvisionRegistryTenant => write!(f, "PROVISION_REGISTRY_TENANT"),
            Self::RegistryHeartbeat => write!(f, "REGISTRY_HEARTBEAT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the dispatch queue
    Queued,
    /// An attempt is executing
    Running,
    /// Waiting out a backoff delay before the next attempt
    RetryScheduled,
    /// Terminal: the forward logic committed
    Succeeded,
    /// Terminal: retries exhausted or a permanent error
    Failed,
}

impl TaskStatus {
    /// Check if this is a terminal status (no further attempts)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Check if an attempt is currently executing
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::RetryScheduled => write!(f, "retry_scheduled"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "retry_scheduled" => Ok(Self::RetryScheduled),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// A durable unit of asynchronous work.
///
/// Workers only read the payload and signal outcomes through the context;
/// the one sanctioned payload mutation is the provision worker recording the
/// generated tenant id (see [`TaskType::ProvisionRegistryTenant`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Error recorded on terminal failure
    pub last_error: Option<String>,
}

impl Task {
    pub fn new(task_type: TaskType) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Queued,
            attempts: 0,
            submitted_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    pub fn create_registry(name: impl Into<String>) -> Self {
        Self::new(TaskType::CreateRegistry { name: name.into() })
    }

    pub fn schedule_registry(registry_id: Uuid) -> Self {
        Self::new(TaskType::ScheduleRegistry { registry_id })
    }

    pub fn provision_registry_tenant(registry_id: Uuid) -> Self {
        Self::new(TaskType::ProvisionRegistryTenant {
            registry_id,
            registry_tenant_id: None,
        })
    }

    pub fn registry_heartbeat(registry_id: Uuid) -> Self {
        Self::new(TaskType::RegistryHeartbeat { registry_id })
    }

    pub fn kind(&self) -> TaskKind {
        self.task_type.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_starts_queued() {
        let task = Task::create_registry("r1");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.attempts, 0);
        assert!(task.last_error.is_none());
        assert_eq!(task.kind(), TaskKind::CreateRegistry);
    }

    #[test]
    fn test_registry_id_extraction() {
        let id = Uuid::new_v4();
        assert_eq!(Task::schedule_registry(id).task_type.registry_id(), Some(id));
        assert_eq!(
            Task::provision_registry_tenant(id).task_type.registry_id(),
            Some(id)
        );
        assert_eq!(Task::registry_heartbeat(id).task_type.registry_id(), Some(id));
        assert_eq!(Task::create_registry("r1").task_type.registry_id(), None);
    }

    #[test]
    fn test_provision_task_carries_no_tenant_id_initially() {
        let task = Task::provision_registry_tenant(Uuid::new_v4());
        match task.task_type {
            TaskType::ProvisionRegistryTenant {
                registry_tenant_id, ..
            } => assert!(registry_tenant_id.is_none()),
            _ => panic!("wrong task type"),
        }
    }

    #[test]
    fn test_status_terminal_check() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::RetryScheduled.is_terminal());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(TaskStatus::RetryScheduled.to_string(), "retry_scheduled");
        assert_eq!(
            "succeeded".parse::<TaskStatus>().unwrap(),
            TaskStatus::Succeeded
        );
        assert!("SUCCEEDED".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_kind_display_matches_wire_names() {
        assert_eq!(TaskKind::ProvisionRegistryTenant.to_string(), "PROVISION_REGISTRY_TENANT");
        assert_eq!(TaskKind::ALL.len(), 4);
    }
}
