//! # Worker Contract
//!
//! A [`Worker`] is the executable behavior bound to one task type. The
//! engine resolves exactly one worker per task kind at construction, runs
//! its forward logic inside one storage transaction, and unconditionally
//! runs its compensation logic in a separate transaction once the task
//! reaches a terminal outcome.

use async_trait::async_trait;

use crate::execution::task::Task;
use crate::services::auth::AuthError;
use crate::services::tenant_manager::TenantManagerError;
use crate::state_machine::StateTransitionError;
use crate::storage::{StorageError, StorageTransaction};

/// Failure of a worker attempt, classified for the retry/compensation path
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker requested a re-queue with backoff
    #[error("retry requested: {reason}")]
    Retry { reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    TenantManager(#[from] TenantManagerError),
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),
    /// The task payload does not match the worker's expectations
    #[error("invalid task payload: {0}")]
    InvalidPayload(String),
    /// The engine or worker is wired up wrong (e.g. no deployment targets)
    #[error("worker misconfigured: {0}")]
    Configuration(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkerError {
    /// Transient failures resolve through bounded retry; everything else is
    /// terminal and triggers compensation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Retry { .. } => true,
            Self::Storage(err) => err.is_retryable(),
            Self::Auth(err) => err.is_retryable(),
            Self::TenantManager(err) => err.is_retryable(),
            Self::StateTransition(_)
            | Self::InvalidPayload(_)
            | Self::Configuration(_)
            | Self::Other(_) => false,
        }
    }
}

pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

/// Deferred action registered during an attempt, fired only after the
/// attempt's transaction commits
pub type DelayedAction = Box<dyn FnOnce() + Send + 'static>;

/// Control handle given to a worker for the duration of one attempt.
///
/// Exposes the attempt's storage transaction, the retry signal, and the
/// post-commit delay queue.
pub struct WorkerContext<'a> {
    tx: &'a mut dyn StorageTransaction,
    attempt: u32,
    max_attempts: u32,
    delayed: Vec<DelayedAction>,
}

impl<'a> WorkerContext<'a> {
    pub(crate) fn new(tx: &'a mut dyn StorageTransaction, attempt: u32, max_attempts: u32) -> Self {
        Self {
            tx,
            attempt,
            max_attempts,
            delayed: Vec::new(),
        }
    }

    /// The attempt's transaction; all worker writes go through it
    pub fn tx(&mut self) -> &mut dyn StorageTransaction {
        self.tx
    }

    /// 1-based attempt number of the current execution
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Configured attempt bound for this engine
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Request a re-queue with backoff, discarding this attempt's writes.
    ///
    /// Returns the signal for the worker to propagate:
    /// `return Err(ctx.retry("registry not visible yet"));`
    pub fn retry(&self, reason: impl Into<String>) -> WorkerError {
        WorkerError::Retry {
            reason: reason.into(),
        }
    }

    /// Register an action that fires only after this attempt's transaction
    /// commits; discarded on rollback
    pub fn delay(&mut self, action: impl FnOnce() + Send + 'static) {
        self.delayed.push(Box::new(action));
    }

    pub(crate) fn take_delayed(&mut self) -> Vec<DelayedAction> {
        std::mem::take(&mut self.delayed)
    }
}

/// Polymorphic per-type strategy executed by the engine.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Stable name used in logs and events
    fn name(&self) -> &'static str;

    /// Pure type-match predicate with no side effects
    fn matches(&self, task: &Task) -> bool;

    /// Forward logic for one attempt, inside the context's transaction
    async fn execute(&self, task: &mut Task, ctx: &mut WorkerContext<'_>) -> WorkerResult<()>;

    /// Compensation logic, run exactly once per terminal outcome in its own
    /// transaction.
    ///
    /// Must be idempotent and must infer what to clean up solely from
    /// durably persisted state, because it may run in a separate process
    /// invocation after a crash. `error` carries the triggering failure,
    /// `None` on success.
    async fn compensate(
        &self,
        task: &mut Task,
        ctx: &mut WorkerContext<'_>,
        error: Option<&WorkerError>,
    ) -> WorkerResult<()> {
        let _ = (task, ctx, error);
        Ok(())
    }
}
