//! Scheduling core: windows, tasks, the worker pool and the loop.

pub mod audit;
pub mod error;
pub mod exception_sink;
pub mod executor;
pub mod scheduler;
pub mod shutdown;
pub mod task;
pub(crate) mod units;
pub mod wait;
pub mod window;
pub mod worker_pool;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, ErrorKind, FailureReport, SchedulerError};
pub use exception_sink::ExceptionSink;
pub use executor::TaskBody;
pub use scheduler::{ExitStatus, RunOptions, Scheduler};
pub use shutdown::{ExitSignal, ShutdownCoordinator, ShutdownHandle, ShutdownTrigger};
pub use task::{InvocationId, Task, TaskKind, TaskOptions};
pub use wait::WaitPolicy;
pub use window::{compute_next_run, Delay, DelayComponent, ScheduleWindow, TimeUnit};
pub use worker_pool::{PoolError, PoolStats, TaskHandle, TaskOutcome, WorkerPool};
