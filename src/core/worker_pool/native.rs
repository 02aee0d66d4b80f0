//! `WorkerPool` backed by OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv until a job arrives
//! - **Unbounded queue**: a dispatch never blocks and never fails while the pool runs
//! - **Detach on stop**: dropping the sender unblocks idle workers; busy ones finish
//!   their current body and exit without being joined

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::executor::TaskBody;
use crate::core::task::InvocationId;
use crate::util::telemetry::SCHEDULER;

use super::{PoolCounters, PoolError, PoolStats, TaskHandle, TaskOutcome, WorkerJob};

/// Worker pool with dedicated OS threads for blocking task bodies.
pub struct WorkerPool {
    /// Number of worker threads.
    worker_count: usize,

    /// Job sender (to workers). Option allows shutdown by dropping.
    job_tx: Mutex<Option<Sender<WorkerJob>>>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Shutdown flag (lock-free atomic).
    shutdown: Arc<AtomicBool>,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool from the given configuration.
    ///
    /// This spawns `config.worker_count` OS threads.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid and
    /// `PoolError::Internal` if a thread cannot be spawned.
    pub fn new(config: &SchedulerConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = unbounded::<WorkerJob>();
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                worker_id,
                job_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                config.thread_stack_size,
            )?;
            workers.push(worker);
        }

        info!(
            target: SCHEDULER,
            worker_count = config.worker_count,
            "Worker pool initialized"
        );

        Ok(Self {
            worker_count: config.worker_count,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown,
            workers: Mutex::new(workers),
        })
    }

    /// Hand a body to the pool.
    ///
    /// Never blocks: if every worker is busy the job waits in the queue.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` once the pool has been stopped.
    pub fn dispatch(&self, id: InvocationId, body: TaskBody) -> Result<TaskHandle, PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let (reply, rx) = oneshot::channel();
        let job = WorkerJob {
            id: id.clone(),
            body,
            reply,
        };

        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        job_tx.send(job).map_err(|_| PoolError::PoolShutdown)?;
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(target: SCHEDULER, invocation = %id, "Job queued for worker pool");

        Ok(TaskHandle { id, rx })
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.worker_count)
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop the pool without waiting for in-flight bodies.
    ///
    /// Queued jobs are discarded and their handles resolve to
    /// [`TaskOutcome::Cancelled`]. Worker threads are detached so process
    /// exit never waits on a long-running body. Returns the number of threads
    /// released; a second call releases none.
    pub fn shutdown(&self) -> usize {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return 0;
        }

        // Drop the sender to unblock all workers waiting on recv()
        self.job_tx.lock().take();

        let released: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let busy = released.iter().filter(|w| !w.is_finished()).count();
        if busy > 0 {
            warn!(target: SCHEDULER, busy, "Detaching workers that are still running task bodies");
        }
        released.len()
    }

    /// Stop the pool and wait for every worker to exit.
    ///
    /// Used when the scheduler finishes on its own, after all outcomes have
    /// been observed, so joining cannot hang.
    pub fn join(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.job_tx.lock().take();

        let mut workers = self.workers.lock();
        for (worker_id, worker) in workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!(target: SCHEDULER, worker_id, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!(target: SCHEDULER, "WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    job_rx: Receiver<WorkerJob>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    stack_size: usize,
) -> Result<JoinHandle<()>, PoolError> {
    thread::Builder::new()
        .name(format!("scheduler-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(target: SCHEDULER, worker_id, "Worker thread started");

            // When the sender is dropped and the queue drained, recv returns Err
            while let Ok(job) = job_rx.recv() {
                counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);

                if shutdown.load(Ordering::Acquire) {
                    // Dropping the job drops its reply sender: the handle reads Cancelled
                    debug!(target: SCHEDULER, worker_id, invocation = %job.id, "Discarding job after shutdown");
                    continue;
                }

                counters.active_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(target: SCHEDULER, worker_id, invocation = %job.id, "Worker executing task");

                let outcome = match job.body.invoke() {
                    Ok(()) => {
                        counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                        TaskOutcome::Completed
                    }
                    Err(report) => {
                        counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        TaskOutcome::Failed(report)
                    }
                };
                counters.active_tasks.fetch_sub(1, Ordering::Relaxed);

                // The loop may already be gone; nobody is left to tell
                let _ = job.reply.send(outcome);
            }

            debug!(target: SCHEDULER, worker_id, "Worker thread exiting");
        })
        .map_err(|e| PoolError::Internal(format!("failed to spawn worker thread: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::TaskKind;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn id(name: &str) -> InvocationId {
        InvocationId::new(TaskKind::Delayed, name)
    }

    #[tokio::test]
    async fn test_worker_pool_basic() {
        let pool = WorkerPool::new(&SchedulerConfig::new().with_worker_count(2)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let handle = pool
            .dispatch(
                id("hello"),
                TaskBody::new("hello", move || {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        assert_eq!(handle.outcome().await, TaskOutcome::Completed);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let stats = pool.stats();
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.submitted_tasks, 1);
        pool.join();
    }

    #[tokio::test]
    async fn test_failed_body_is_reported() {
        let pool = WorkerPool::new(&SchedulerConfig::new().with_worker_count(1)).unwrap();
        let handle = pool
            .dispatch(id("broken"), TaskBody::new("broken", || anyhow::bail!("virsh not found")))
            .unwrap();

        match handle.outcome().await {
            TaskOutcome::Failed(report) => assert_eq!(report.message, "virsh not found"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(pool.stats().failed_tasks, 1);
        pool.join();
    }

    #[test]
    fn test_dispatch_after_shutdown_fails() {
        let pool = WorkerPool::new(&SchedulerConfig::new().with_worker_count(1)).unwrap();
        assert_eq!(pool.shutdown(), 1);
        assert_eq!(pool.shutdown(), 0);
        assert!(pool.is_shut_down());

        let err = pool.dispatch(id("late"), TaskBody::new("late", || Ok(()))).unwrap_err();
        assert!(matches!(err, PoolError::PoolShutdown));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = WorkerPool::new(&SchedulerConfig::new().with_worker_count(0));
        assert!(matches!(err, Err(PoolError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_jobs() {
        let pool = WorkerPool::new(&SchedulerConfig::new().with_worker_count(1)).unwrap();
        let blocker = pool
            .dispatch(
                id("slow"),
                TaskBody::new("slow", || {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(())
                }),
            )
            .unwrap();
        // give the single worker time to pick up the slow job
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = pool.dispatch(id("queued"), TaskBody::new("queued", || Ok(()))).unwrap();

        pool.shutdown();

        assert_eq!(queued.outcome().await, TaskOutcome::Cancelled);
        // in-flight body is not interrupted
        assert_eq!(blocker.outcome().await, TaskOutcome::Completed);
    }
}
