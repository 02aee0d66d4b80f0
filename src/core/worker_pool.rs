//! Worker pool running task bodies on dedicated OS threads.
//!
//! The scheduling loop is single threaded and must never block, so every
//! task body is handed to this pool. A dispatch returns a [`TaskHandle`]
//! immediately; the body's outcome arrives on that handle once a worker has
//! run it.
//!
//! # Key Features
//!
//! - **Fixed size**: `worker_count` threads are spawned at construction
//! - **Queue, never drop**: dispatches beyond the free-worker count wait in
//!   an unbounded channel until a worker frees up
//! - **Isolation**: errors and panics in a body become a [`TaskOutcome`]
//! - **Non-blocking stop**: shutdown does not wait for in-flight bodies
//!
//! # Example
//!
//! ```rust,ignore
//! let pool = WorkerPool::new(SchedulerConfig::new().with_worker_count(2))?;
//! let handle = pool.dispatch(task.invocation_id(), body)?;
//! match handle.outcome().await {
//!     TaskOutcome::Completed => {}
//!     TaskOutcome::Failed(report) => eprintln!("{report}"),
//!     TaskOutcome::Cancelled => {}
//! }
//! ```

mod native;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;

use crate::core::error::FailureReport;
use crate::core::executor::TaskBody;
use crate::core::task::InvocationId;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The pool has been shut down.
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Internal error (thread spawn failure, channel closed, etc.).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Bodies currently executing.
    pub active_tasks: u64,

    /// Bodies waiting for a free worker.
    pub queued_tasks: u64,

    /// Bodies that returned `Ok`.
    pub completed_tasks: u64,

    /// Bodies that returned an error or panicked.
    pub failed_tasks: u64,

    /// Total dispatches accepted.
    pub submitted_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
        }
    }
}

/// How a dispatched body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The body returned `Ok`.
    Completed,
    /// The body returned an error or panicked.
    Failed(FailureReport),
    /// The body never ran to completion because the pool was stopped.
    Cancelled,
}

/// A body queued for a worker, with the channel its outcome is sent on.
pub(crate) struct WorkerJob {
    pub id: InvocationId,
    pub body: TaskBody,
    pub reply: oneshot::Sender<TaskOutcome>,
}

/// Receiving side of a dispatch.
///
/// Dropping the handle does not cancel the body; it only discards the outcome.
#[derive(Debug)]
pub struct TaskHandle {
    id: InvocationId,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Invocation this handle belongs to.
    #[must_use]
    pub const fn id(&self) -> &InvocationId {
        &self.id
    }

    /// Wait for the body to finish.
    ///
    /// Resolves to [`TaskOutcome::Cancelled`] if the job was discarded by a
    /// pool shutdown before a worker could report back.
    pub async fn outcome(self) -> TaskOutcome {
        self.rx.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

pub use native::WorkerPool;
