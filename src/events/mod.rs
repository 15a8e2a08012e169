//! Lifecycle event system: broadcast publisher plus well-known event names.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};

/// Task lifecycle event names published by the engine
pub mod names {
    pub const TASK_SUBMITTED: &str = "task.submitted";
    pub const TASK_RETRY_SCHEDULED: &str = "task.retry_scheduled";
    pub const TASK_SUCCEEDED: &str = "task.succeeded";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_COMPENSATION_FAILED: &str = "task.compensation_failed";
}
