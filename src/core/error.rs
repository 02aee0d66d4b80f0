//! Error types for scheduler operations.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::core::worker_pool::PoolError;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Unit, round or delay could not produce a valid run time.
    #[error("schedule computation failed: {0}")]
    ScheduleComputation(String),
    /// An error escaped the scheduling loop itself.
    #[error("scheduling loop failed: {0}")]
    LoopFatal(String),
    /// The worker pool refused a dispatch.
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
    /// The loop runtime or signal listeners could not be set up.
    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Application-facing result using anyhow for task bodies and higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Failure category carried by a [`FailureReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`SchedulerError::ScheduleComputation`].
    ScheduleComputation,
    /// A task body returned an error or panicked. Never reaches the loop:
    /// it only travels as a [`FailureReport`] in a task outcome.
    TaskExecution,
    /// See [`SchedulerError::LoopFatal`].
    LoopFatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScheduleComputation => write!(f, "ScheduleComputationError"),
            Self::TaskExecution => write!(f, "TaskExecutionError"),
            Self::LoopFatal => write!(f, "LoopFatalError"),
        }
    }
}

/// Structured failure value rendered uniformly by the log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Failure category.
    pub kind: ErrorKind,
    /// One-line message.
    pub message: String,
    /// Full detail: error chain (and backtrace when captured) or panic payload.
    pub detail: String,
}

impl FailureReport {
    /// Report for an error returned by a task body.
    #[must_use]
    pub fn from_task_error(err: &anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::TaskExecution,
            message: err.to_string(),
            detail: format!("{err:?}"),
        }
    }

    /// Report for a panic caught on a worker thread or in a loop unit.
    #[must_use]
    pub fn from_panic(kind: ErrorKind, payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            kind,
            detail: format!("panicked: {message}"),
            message,
        }
    }

    /// Report for a scheduler error that escaped a loop unit.
    #[must_use]
    pub fn from_scheduler_error(err: &SchedulerError) -> Self {
        let kind = match err {
            SchedulerError::ScheduleComputation(_) => ErrorKind::ScheduleComputation,
            SchedulerError::LoopFatal(_) | SchedulerError::Pool(_) | SchedulerError::Runtime(_) => {
                ErrorKind::LoopFatal
            }
        };
        Self {
            kind,
            message: err.to_string(),
            detail: format!("{err:?}"),
        }
    }

    /// Multi-line rendering used for full-detail log output.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {}\n{}", self.kind, self.message, self.detail)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
