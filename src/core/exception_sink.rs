//! Uniform reporting of loop-level and task-level failures.
//!
//! Loop-level failures stop the scheduler: they are logged, flip the
//! exit-affecting flag and request a shutdown. Task-level failures are only
//! logged: a failing body never affects the loop or other tasks, and is not
//! retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::core::audit::{build_audit_event, AuditSink};
use crate::core::error::FailureReport;
use crate::core::shutdown::ShutdownTrigger;
use crate::core::task::InvocationId;
use crate::core::worker_pool::{TaskHandle, TaskOutcome};
use crate::util::telemetry::{SCHEDULER, TASK};

/// Audit sink shared by every clone of the exception sink.
pub(crate) type SharedAudit = Arc<Mutex<Box<dyn AuditSink>>>;

/// Failure reporting shared by the loop and every dispatch watcher.
#[derive(Clone)]
pub struct ExceptionSink {
    debug: bool,
    exception_caught: Arc<AtomicBool>,
    triggers: mpsc::UnboundedSender<ShutdownTrigger>,
    audit: Option<SharedAudit>,
}

impl ExceptionSink {
    pub(crate) const fn new(
        debug: bool,
        exception_caught: Arc<AtomicBool>,
        triggers: mpsc::UnboundedSender<ShutdownTrigger>,
        audit: Option<SharedAudit>,
    ) -> Self {
        Self {
            debug,
            exception_caught,
            triggers,
            audit,
        }
    }

    /// Handle an error that escaped the loop: log, flag, request shutdown.
    pub fn loop_fatal(&self, report: &FailureReport) {
        error!(target: SCHEDULER, "Exception handler called");
        error!(target: SCHEDULER, "Caught scheduler exception: \"{report}\"");
        error!(target: SCHEDULER, "{}", report.detail);
        self.exception_caught.store(true, Ordering::SeqCst);
        // The loop holds a receiver for as long as it can act on this
        let _ = self.triggers.send(ShutdownTrigger::Fatal);
    }

    /// A task unit ended with an error that the run was told to absorb.
    pub fn unit_failed(&self, report: &FailureReport) {
        error!(target: SCHEDULER, "Task unit stopped: {report}");
        if self.debug {
            error!(target: SCHEDULER, "{}", report.detail);
        }
    }

    /// Record that an invocation has been scheduled for `next_run`.
    pub fn scheduled(&self, id: &InvocationId, next_run: &str, loud: bool) {
        if loud {
            tracing::info!(target: TASK, "{id} - task scheduled at: {next_run}");
        } else {
            debug!(target: TASK, "{id} - task scheduled at: {next_run}");
        }
        self.audit(id, "scheduled", Some(next_run.to_string()));
    }

    /// Record that an invocation was handed to the pool.
    pub fn dispatched(&self, id: &InvocationId) {
        debug!(target: TASK, "{id} - task started");
        self.audit(id, "dispatched", None);
    }

    /// Log and audit the outcome of one invocation.
    pub fn task_outcome(&self, id: &InvocationId, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Cancelled => {
                debug!(target: TASK, "{id} - task cancelled");
                self.audit(id, "cancelled", None);
            }
            TaskOutcome::Failed(report) => {
                error!(target: TASK, "{id} - task raised an exception");
                if self.debug {
                    error!(target: TASK, "{}", report.render());
                }
                self.audit(id, "failed", Some(report.message.clone()));
            }
            TaskOutcome::Completed => {
                debug!(target: TASK, "{id} - task finished");
                self.audit(id, "completed", None);
            }
        }
    }

    /// Await a dispatch and report its outcome. Never fails.
    pub async fn observe(self, handle: TaskHandle) {
        let id = handle.id().clone();
        let outcome = handle.outcome().await;
        self.task_outcome(&id, &outcome);
    }

    fn audit(&self, id: &InvocationId, action: &str, payload: Option<String>) {
        if let Some(audit) = &self.audit {
            audit.lock().record(build_audit_event(id, action, payload));
        }
    }
}
