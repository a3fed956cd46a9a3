//! Scheduler messages
//!
//! Commands, errors and snapshots for the actor pattern.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use super::task::Task;
use super::ticker::Rate;

/// Why a submitted task did not produce a value
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// Rejected at admission; the task was never enqueued
    #[error("Exceeded max queue length ({max_queued})")]
    QueueFull { max_queued: usize },

    /// The task's own work failed; the error is passed through unchanged
    #[error("Task failed: {0}")]
    Failed(E),

    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The scheduler went away before the task settled
    #[error("Scheduler dropped before the task completed")]
    Dropped,
}

impl<E> TaskError<E> {
    pub fn is_queue_full(&self) -> bool {
        matches!(self, TaskError::QueueFull { .. })
    }

    /// The task's own error, if that is what this is
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome delivered to the submitter of a task
pub type TaskResult<T, E> = Result<T, TaskError<E>>;

/// Errors from scheduler control operations
#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    #[error("Invalid rate: {0} (must be positive)")]
    InvalidRate(f64),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Scheduler channel closed")]
    ChannelClosed,
}

/// Commands sent to the scheduler actor
pub(crate) enum Command<T, E> {
    /// Admit a task; `auto_start` also ensures the ticker is running
    Submit { task: Task<T, E>, auto_start: bool },
    Start,
    Stop,
    SetRate(Rate),
    SetMaxConcurrent(Option<usize>),
    SetMaxQueued(Option<usize>),
    State { reply: oneshot::Sender<QueueState> },
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_rejected: u64,
    pub total_dispatched: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub peak_queue_depth: usize,
    pub peak_concurrent: usize,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct QueueState {
    pub running: bool,
    pub queued: usize,
    pub in_flight: usize,
    pub processed: u64,
    pub rate: Rate,
    pub max_concurrent: Option<usize>,
    pub max_queued: Option<usize>,
    pub stats: SchedulerStats,
}
