//! Signal- and failure-triggered teardown of the loop and pool.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::units::CooperativeUnits;
use crate::core::worker_pool::WorkerPool;
use crate::util::telemetry::SCHEDULER;

/// OS signals that stop the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitSignal {
    /// `SIGHUP`.
    Hangup,
    /// `SIGTERM`.
    Terminate,
    /// `SIGINT`.
    Interrupt,
}

impl ExitSignal {
    /// Every signal the scheduler listens for.
    pub const ALL: [Self; 3] = [Self::Hangup, Self::Terminate, Self::Interrupt];

    /// Conventional signal name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hangup => "SIGHUP",
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
        }
    }

    /// Whether receiving this signal makes the run exit with a failure code.
    ///
    /// Only an interrupt counts as a clean stop.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Interrupt)
    }
}

impl fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why the loop is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS signal, or one delivered through a [`ShutdownHandle`].
    Signal(ExitSignal),
    /// An error escaped the loop; already reported by the exception sink.
    Fatal,
}

/// Cloneable handle delivering shutdown triggers to a running scheduler.
///
/// Usable from any thread, before or during `run`.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<ShutdownTrigger>,
}

impl ShutdownHandle {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<ShutdownTrigger>) -> Self {
        Self { tx }
    }

    /// Deliver `signal` as if the OS had sent it.
    ///
    /// Returns `false` if the scheduler has already finished.
    pub fn signal(&self, signal: ExitSignal) -> bool {
        self.tx.send(ShutdownTrigger::Signal(signal)).is_ok()
    }
}

/// Runs the shutdown sequence once, no matter how many triggers arrive.
pub struct ShutdownCoordinator {
    grace: Duration,
    timeout: Duration,
    exception_caught: Arc<AtomicBool>,
    stopped: bool,
}

impl ShutdownCoordinator {
    /// Coordinator sharing the run's exit-affecting error flag.
    #[must_use]
    pub const fn new(grace: Duration, timeout: Duration, exception_caught: Arc<AtomicBool>) -> Self {
        Self {
            grace,
            timeout,
            exception_caught,
            stopped: false,
        }
    }

    /// Cancel every unit and stop the pool.
    ///
    /// Returns `false` without doing anything if shutdown already happened.
    pub(crate) async fn shutdown(
        &mut self,
        trigger: ShutdownTrigger,
        units: &mut CooperativeUnits,
        pool: &WorkerPool,
    ) -> bool {
        if self.stopped {
            debug!(target: SCHEDULER, ?trigger, "Shutdown already done, ignoring trigger");
            return false;
        }
        self.stopped = true;

        if let ShutdownTrigger::Signal(signal) = trigger {
            warn!(target: SCHEDULER, "Received exit signal {signal}...");
            if signal.is_failure() {
                self.exception_caught.store(true, Ordering::SeqCst);
            }
        }

        warn!(target: SCHEDULER, "Stopping scheduled tasks");
        tokio::time::sleep(self.grace).await;

        debug!(target: SCHEDULER, units = units.len(), "Cancelling scheduled units");
        let cancelled = units.cancel_all(self.timeout).await;
        debug!(target: SCHEDULER, cancelled, "Units cancelled");

        let released = pool.shutdown();
        info!(target: SCHEDULER, "Releasing {released} threads from worker pool");
        true
    }
}
