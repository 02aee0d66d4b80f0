//! Builders to construct the worker pool from configuration.

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::{SchedulerError, WorkerPool};
use crate::util::telemetry::SCHEDULER;

/// Build the worker pool described by a scheduler configuration.
///
/// # Errors
///
/// Returns `SchedulerError::Pool` if the configuration is invalid or a worker
/// thread cannot be spawned.
pub fn build_worker_pool(cfg: &SchedulerConfig) -> Result<WorkerPool, SchedulerError> {
    debug!(
        target: SCHEDULER,
        worker_count = cfg.worker_count,
        stack_size = cfg.thread_stack_size,
        "Building worker pool"
    );
    Ok(WorkerPool::new(cfg)?)
}
