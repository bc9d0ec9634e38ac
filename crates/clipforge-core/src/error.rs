use thiserror::Error;

use crate::runtime::types::{TaskId, TaskStatus};

/// A generation request that cannot be turned into a task.
///
/// Raised synchronously at submission time; no task record exists for a
/// request that fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An explicitly supplied numeric override was zero.
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("prompt exceeds {max} characters")]
    PromptTooLong { max: usize },
}

/// A rejected update to a task record.
///
/// The task store checks every proposed record against the current one, so
/// these errors mean the update was discarded and the stored record is
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task cannot move from {from} to {to}")]
    Illegal { from: TaskStatus, to: TaskStatus },

    /// The record is terminal; nothing about it may change any more.
    #[error("task is {status}; record is frozen")]
    Frozen { status: TaskStatus },

    #[error("progress cannot decrease from {from} to {to}")]
    ProgressRegressed { from: u8, to: u8 },

    #[error("field '{field}' is immutable")]
    ImmutableField { field: &'static str },

    #[error("inconsistent record: {0}")]
    Inconsistent(&'static str),
}

/// Errors surfaced by the task runtime to synchronous callers.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The referenced task does not exist (never created, or already purged).
    #[error("task not found: {task_id}")]
    NotFound { task_id: TaskId },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Every worker has exited, so new work can no longer be accepted.
    #[error("scheduler has shut down")]
    SchedulerShutdown,
}
