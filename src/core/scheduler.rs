//! The scheduler: task registration and the cooperative scheduling loop.
//!
//! Registration is a closed build phase. Tasks are added to a [`Scheduler`]
//! and [`Scheduler::run`] consumes it, so nothing can be added or removed
//! once the loop is running.
//!
//! Inside `run`, a single-threaded runtime hosts one cooperative unit per
//! task. A unit computes its next window, waits for it, and asks the loop to
//! dispatch the body to the worker pool. The loop is the only owner of the
//! pool; it never waits for a body to finish before a unit schedules its
//! next period, so a slow body may overlap its own next run.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info};

use crate::builders::build_worker_pool;
use crate::config::SchedulerConfig;
use crate::core::audit::AuditSink;
use crate::core::error::{ErrorKind, FailureReport};
use crate::core::exception_sink::{ExceptionSink, SharedAudit};
use crate::core::executor::TaskBody;
use crate::core::shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownTrigger};
use crate::core::task::{InvocationId, Task, TaskKind, TaskOptions};
use crate::core::units::CooperativeUnits;
use crate::core::wait::WaitPolicy;
use crate::core::window::TimeUnit;
use crate::core::worker_pool::WorkerPool;
use crate::core::SchedulerError;
use crate::runtime::{build_loop_runtime, spawn_signal_listeners};
use crate::util::clock::now_local;
use crate::util::telemetry::{init_tracing, SCHEDULER};

/// Options for [`Scheduler::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Absorb errors from individual task units instead of stopping the run.
    pub handle_exceptions: bool,
    /// Emit debug lines and full failure detail.
    ///
    /// Applies to the subscriber this crate installs, which every run
    /// reconfigures. A subscriber installed by the embedding program keeps
    /// its own level, and `RUST_LOG` overrides this flag.
    pub debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            handle_exceptions: true,
            debug: false,
        }
    }
}

impl RunOptions {
    /// Defaults: absorb unit errors, no debug output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether unit errors are absorbed.
    #[must_use]
    pub const fn handle_exceptions(mut self, yes: bool) -> Self {
        self.handle_exceptions = yes;
        self
    }

    /// Set debug output.
    #[must_use]
    pub const fn debug(mut self, yes: bool) -> Self {
        self.debug = yes;
        self
    }
}

/// Result of a run, convertible into a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Finished on its own or stopped by an interrupt.
    Success,
    /// Stopped by a loop-level error or a non-interrupt signal.
    Failure,
}

impl ExitStatus {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => Self::SUCCESS,
            ExitStatus::Failure => Self::FAILURE,
        }
    }
}

/// Periodic and delayed task scheduler.
///
/// # Example
///
/// ```rust,ignore
/// use periodic_exporter_scheduler::config::SchedulerConfig;
/// use periodic_exporter_scheduler::core::{Delay, DelayComponent, RunOptions, Scheduler, TaskBody, TaskOptions, TimeUnit};
///
/// let mut scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(2))?;
/// scheduler.add_periodic(
///     TaskBody::new("stats_disks", stats_disks),
///     TimeUnit::Day,
///     TaskOptions::new().with_delay(Delay::none().with_hours(2).with_minutes(DelayComponent::jitter(0..120))),
/// )?;
/// scheduler.add_periodic(TaskBody::new("heartbeat", heartbeat), TimeUnit::Second, TaskOptions::new().with_round(2))?;
/// std::process::exit(scheduler.run(RunOptions::default()).code());
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    pool: WorkerPool,
    tasks: Vec<Task>,
    audit: Option<SharedAudit>,
    trigger_tx: mpsc::UnboundedSender<ShutdownTrigger>,
    trigger_rx: mpsc::UnboundedReceiver<ShutdownTrigger>,
}

impl Scheduler {
    /// Create a scheduler and spawn its worker pool.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Pool` if the configuration is invalid or the
    /// workers cannot be spawned.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let pool = build_worker_pool(&config)?;
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            pool,
            tasks: Vec::new(),
            audit: None,
            trigger_tx,
            trigger_rx,
        })
    }

    /// Scheduler with the default configuration (8 workers).
    ///
    /// # Errors
    ///
    /// See [`Scheduler::new`].
    pub fn with_defaults() -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig::default())
    }

    /// Attach an audit sink recording every invocation's lifecycle.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Register a task that runs on every `round * unit` boundary.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ScheduleComputation` for a zero round or a
    /// delay that does not resolve.
    pub fn add_periodic(&mut self, body: TaskBody, unit: TimeUnit, options: TaskOptions) -> Result<(), SchedulerError> {
        self.register(Task::new(body, TaskKind::Periodic, unit, options)?);
        Ok(())
    }

    /// Register a task that runs once, at the next boundary or immediately.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ScheduleComputation` for a zero round or a
    /// delay that does not resolve.
    pub fn add_delayed(&mut self, body: TaskBody, unit: TimeUnit, options: TaskOptions) -> Result<(), SchedulerError> {
        self.register(Task::new(body, TaskKind::Delayed, unit, options)?);
        Ok(())
    }

    fn register(&mut self, task: Task) {
        debug!(
            target: SCHEDULER,
            task = task.name(),
            kind = %task.kind,
            unit = %task.unit,
            round = task.options.round,
            "Task registered"
        );
        self.tasks.push(task);
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Handle that stops the run from another thread.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.trigger_tx.clone())
    }

    /// Run every registered task until they all finish or a shutdown trigger
    /// arrives, blocking the calling thread.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run(self, options: RunOptions) -> ExitStatus {
        init_tracing(options.debug);
        info!(target: SCHEDULER, "Starting scheduler");

        let Self {
            config,
            pool,
            tasks,
            audit,
            trigger_tx,
            trigger_rx,
        } = self;

        let runtime = match build_loop_runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(target: SCHEDULER, "Caught scheduler exception: \"{e}\"");
                pool.shutdown();
                return ExitStatus::Failure;
            }
        };

        let exception_caught = Arc::new(AtomicBool::new(false));
        let sink = ExceptionSink::new(options.debug, Arc::clone(&exception_caught), trigger_tx.clone(), audit);
        let scheduling_loop = SchedulingLoop {
            pool,
            units: CooperativeUnits::default(),
            triggers: trigger_rx,
            sink,
            coordinator: ShutdownCoordinator::new(
                config.shutdown_grace(),
                config.shutdown_timeout(),
                Arc::clone(&exception_caught),
            ),
            wait: WaitPolicy {
                poll_interval: config.poll_interval(),
                hard_wait_chunk: config.hard_wait_chunk(),
            },
            handle_exceptions: options.handle_exceptions,
        };

        let end = runtime.block_on(scheduling_loop.run(tasks, &trigger_tx));

        if end == LoopEnd::Completed {
            info!(target: SCHEDULER, "Completed tasks");
        } else {
            info!(target: SCHEDULER, "Stopping scheduler");
        }

        if exception_caught.load(Ordering::SeqCst) {
            info!(target: SCHEDULER, "Stopped after exception or signal");
            ExitStatus::Failure
        } else {
            ExitStatus::Success
        }
    }
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    /// Every unit and every dispatched body finished.
    Completed,
    /// The shutdown sequence ran.
    Stopped,
}

/// A unit asking the loop to hand a body to the pool.
struct DispatchRequest {
    id: InvocationId,
    body: TaskBody,
}

/// What a task unit needs from the loop.
#[derive(Clone)]
struct UnitContext {
    requests: mpsc::UnboundedSender<DispatchRequest>,
    wait: WaitPolicy,
    sink: ExceptionSink,
}

impl UnitContext {
    fn dispatch(&self, id: InvocationId, task: &Task) -> Result<(), SchedulerError> {
        self.requests
            .send(DispatchRequest {
                id,
                body: task.body.clone(),
            })
            .map_err(|_| SchedulerError::LoopFatal("scheduling loop stopped accepting dispatches".into()))
    }
}

/// Cooperative unit of a periodic task: schedule, wait, dispatch, repeat.
async fn periodic_unit(task: Task, ctx: UnitContext) -> Result<(), SchedulerError> {
    let loud = task.unit == TimeUnit::Day;
    let mut window = task.first_window(now_local())?;
    loop {
        let id = task.invocation_id();
        ctx.sink.scheduled(&id, &window.next_run.to_string(), loud);
        ctx.wait.wait_for(&window, task.unit).await;
        ctx.dispatch(id, &task)?;
        window = task.next_window(now_local())?;
    }
}

/// Cooperative unit of a delayed task: schedule, wait, dispatch once.
async fn delayed_unit(task: Task, ctx: UnitContext) -> Result<(), SchedulerError> {
    let window = task.first_window(now_local())?;
    let id = task.invocation_id();
    ctx.sink.scheduled(&id, &window.next_run.to_string(), false);
    ctx.wait.wait_for(&window, task.unit).await;
    ctx.dispatch(id, &task)
}

/// Loop state. Lives on the loop thread only.
struct SchedulingLoop {
    pool: WorkerPool,
    units: CooperativeUnits,
    triggers: mpsc::UnboundedReceiver<ShutdownTrigger>,
    sink: ExceptionSink,
    coordinator: ShutdownCoordinator,
    wait: WaitPolicy,
    handle_exceptions: bool,
}

impl SchedulingLoop {
    async fn run(mut self, tasks: Vec<Task>, trigger_tx: &mpsc::UnboundedSender<ShutdownTrigger>) -> LoopEnd {
        if let Err(e) = spawn_signal_listeners(&mut self.units.listeners, trigger_tx) {
            self.sink
                .loop_fatal(&FailureReport::from_scheduler_error(&SchedulerError::Runtime(e)));
        }

        let (request_tx, mut requests) = mpsc::unbounded_channel();
        for task in tasks {
            let ctx = UnitContext {
                requests: request_tx.clone(),
                wait: self.wait,
                sink: self.sink.clone(),
            };
            match task.kind {
                TaskKind::Periodic => self.units.tasks.spawn(periodic_unit(task, ctx)),
                TaskKind::Delayed => self.units.tasks.spawn(delayed_unit(task, ctx)),
            };
        }
        // Units hold the only senders from here on
        drop(request_tx);

        loop {
            if self.units.is_idle() {
                match self.triggers.try_recv() {
                    Ok(trigger) => return self.stop(trigger).await,
                    Err(_) => break,
                }
            }

            tokio::select! {
                biased;
                Some(trigger) = self.triggers.recv() => return self.stop(trigger).await,
                Some(request) = requests.recv() => self.dispatch(request),
                Some(joined) = self.units.tasks.join_next() => {
                    // A finished unit may have sent its last request just before returning
                    while let Ok(request) = requests.try_recv() {
                        self.dispatch(request);
                    }
                    self.on_unit_finished(joined);
                }
                Some(joined) = self.units.watchers.join_next() => {
                    if let Err(e) = joined {
                        self.on_join_error(e);
                    }
                }
                else => break,
            }
        }

        self.pool.join();
        LoopEnd::Completed
    }

    async fn stop(&mut self, trigger: ShutdownTrigger) -> LoopEnd {
        self.coordinator.shutdown(trigger, &mut self.units, &self.pool).await;
        LoopEnd::Stopped
    }

    fn dispatch(&mut self, request: DispatchRequest) {
        let DispatchRequest { id, body } = request;
        match self.pool.dispatch(id.clone(), body) {
            Ok(handle) => {
                self.sink.dispatched(&id);
                self.units.watchers.spawn(self.sink.clone().observe(handle));
            }
            Err(e) => self
                .sink
                .loop_fatal(&FailureReport::from_scheduler_error(&SchedulerError::from(e))),
        }
    }

    fn on_unit_finished(&self, joined: Result<Result<(), SchedulerError>, JoinError>) {
        match joined {
            Ok(Ok(())) => debug!(target: SCHEDULER, "Task unit finished"),
            Ok(Err(e)) => {
                let report = FailureReport::from_scheduler_error(&e);
                if self.handle_exceptions {
                    self.sink.unit_failed(&report);
                } else {
                    self.sink.loop_fatal(&report);
                }
            }
            Err(e) => self.on_join_error(e),
        }
    }

    fn on_join_error(&self, e: JoinError) {
        if e.is_panic() {
            let payload = e.into_panic();
            self.sink
                .loop_fatal(&FailureReport::from_panic(ErrorKind::LoopFatal, payload.as_ref()));
        } else {
            debug!(target: SCHEDULER, "Unit cancelled");
        }
    }
}
