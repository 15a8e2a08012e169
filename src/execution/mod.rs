//! # Task Execution Engine
//!
//! Durable, asynchronous task execution: tasks are submitted fire-and-forget,
//! dispatched to the single worker owning their type, executed inside one
//! storage transaction per attempt, retried with bounded backoff on transient
//! failure, and compensated exactly once per terminal outcome.

pub mod backoff_calculator;
pub mod task;
pub mod task_enqueuer;
pub mod task_manager;
pub mod worker;
pub mod workers;

pub use backoff_calculator::BackoffCalculator;
pub use task::{Task, TaskKind, TaskStatus, TaskType};
pub use task_enqueuer::{TaskEnqueuer, TaskStore};
pub use task_manager::TaskManager;
pub use worker::{DelayedAction, Worker, WorkerContext, WorkerError, WorkerResult};
