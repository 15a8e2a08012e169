use crate::error::{FleetError, Result};

/// A candidate cluster deployment that registries can be scheduled onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub name: String,
    pub registry_deployment_url: String,
    pub tenant_manager_url: String,
}

impl DeploymentTarget {
    pub fn new(
        name: impl Into<String>,
        registry_deployment_url: impl Into<String>,
        tenant_manager_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            registry_deployment_url: registry_deployment_url.into(),
            tenant_manager_url: tenant_manager_url.into(),
        }
    }
}

/// Configuration for retry backoff behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
    /// Exponential multiplier (default: 2.0)
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter_enabled: bool,
    /// Maximum jitter fraction (0.0 to 1.0)
    pub max_jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000, // 1 minute
            multiplier: 2.0,
            jitter_enabled: true,
            max_jitter: 0.1, // 10% jitter
        }
    }
}

#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Upper bound on concurrently executing task attempts
    pub max_concurrent_tasks: usize,
    /// Attempt bound after which a task transitions to failed
    pub task_attempts_max: u32,
    pub backoff: BackoffConfig,
    /// Capacity of the lifecycle event broadcast channel
    pub event_channel_capacity: usize,
    /// Candidate deployments the schedule worker assigns registries to
    pub deployments: Vec<DeploymentTarget>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            task_attempts_max: 5,
            backoff: BackoffConfig::default(),
            event_channel_capacity: 1000,
            deployments: Vec::new(),
        }
    }
}

impl FleetConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max_concurrent) = std::env::var("FLEET_MAX_CONCURRENT_TASKS") {
            config.max_concurrent_tasks = max_concurrent.parse().map_err(|e| {
                FleetError::ConfigurationError(format!("Invalid max_concurrent_tasks: {e}"))
            })?;
        }

        if let Ok(attempts) = std::env::var("FLEET_TASK_ATTEMPTS_MAX") {
            config.task_attempts_max = attempts.parse().map_err(|e| {
                FleetError::ConfigurationError(format!("Invalid task_attempts_max: {e}"))
            })?;
        }

        if let Ok(base) = std::env::var("FLEET_BACKOFF_BASE_MS") {
            config.backoff.base_delay_ms = base.parse().map_err(|e| {
                FleetError::ConfigurationError(format!("Invalid backoff base delay: {e}"))
            })?;
        }

        if let Ok(max) = std::env::var("FLEET_BACKOFF_MAX_MS") {
            config.backoff.max_delay_ms = max.parse().map_err(|e| {
                FleetError::ConfigurationError(format!("Invalid backoff max delay: {e}"))
            })?;
        }

        Ok(config)
    }

    /// Add a deployment target candidate for registry scheduling.
    pub fn with_deployment(mut self, target: DeploymentTarget) -> Self {
        self.deployments.push(target);
        self
    }
}
