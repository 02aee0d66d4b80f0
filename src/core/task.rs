//! Task descriptors and invocation ids.

use std::fmt;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::core::executor::TaskBody;
use crate::core::window::{compute_next_run, Delay, ScheduleWindow, TimeUnit};
use crate::core::SchedulerError;

/// Whether a task recurs or runs once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Rescheduled every window.
    Periodic,
    /// Dispatched once.
    Delayed,
}

impl TaskKind {
    /// Prefix used in invocation ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "period",
            Self::Delayed => "delay",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence parameters supplied at registration.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Run the first invocation right away instead of at the first boundary.
    pub run_immediately: bool,
    /// Extra delay applied inside each window.
    pub delay: Delay,
    /// Number of units per window.
    pub round: u32,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            run_immediately: false,
            delay: Delay::none(),
            round: 1,
        }
    }
}

impl TaskOptions {
    /// Defaults: aligned to every unit, no delay, first run at the next boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the first invocation immediately.
    #[must_use]
    pub const fn run_immediately(mut self, yes: bool) -> Self {
        self.run_immediately = yes;
        self
    }

    /// Set the extra delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Set the window multiplier.
    #[must_use]
    pub const fn with_round(mut self, round: u32) -> Self {
        self.round = round;
        self
    }
}

/// Registered job. Immutable once the scheduler starts running.
#[derive(Debug, Clone)]
pub struct Task {
    /// Body run on the worker pool.
    pub body: TaskBody,
    /// Periodic or delayed.
    pub kind: TaskKind,
    /// Granularity of the window.
    pub unit: TimeUnit,
    /// Recurrence parameters.
    pub options: TaskOptions,
}

impl Task {
    /// Build and validate a task descriptor.
    ///
    /// The delay is resolved once here so malformed parameters fail at
    /// registration; lazy components are still evaluated again every period.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ScheduleComputation` for a zero round or an
    /// invalid delay.
    pub fn new(body: TaskBody, kind: TaskKind, unit: TimeUnit, options: TaskOptions) -> Result<Self, SchedulerError> {
        if options.round == 0 {
            return Err(SchedulerError::ScheduleComputation(format!(
                "task `{}`: round must be a positive integer",
                body.name()
            )));
        }
        options.delay.resolve().map_err(|e| {
            SchedulerError::ScheduleComputation(format!("task `{}`: {e}", body.name()))
        })?;
        Ok(Self { body, kind, unit, options })
    }

    /// Name of the body.
    #[must_use]
    pub fn name(&self) -> &str {
        self.body.name()
    }

    /// Window for the first invocation.
    ///
    /// # Errors
    ///
    /// Propagates schedule computation failures.
    pub fn first_window(&self, now: NaiveDateTime) -> Result<ScheduleWindow, SchedulerError> {
        if self.options.run_immediately {
            Ok(ScheduleWindow::immediate(now))
        } else {
            self.next_window(now)
        }
    }

    /// Window for the following period, re-evaluating lazy delay components.
    ///
    /// # Errors
    ///
    /// Propagates schedule computation failures.
    pub fn next_window(&self, now: NaiveDateTime) -> Result<ScheduleWindow, SchedulerError> {
        let delay = self.options.delay.resolve()?;
        compute_next_run(now, self.unit, self.options.round, delay)
    }

    /// Fresh id for one dispatch of this task.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        InvocationId::new(self.kind, self.name())
    }
}

/// `{kind}:{body-name}:{random-token}`, used only for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId {
    kind: TaskKind,
    task: String,
    rendered: String,
}

impl InvocationId {
    /// Generate a new id.
    #[must_use]
    pub fn new(kind: TaskKind, name: &str) -> Self {
        Self {
            kind,
            task: name.to_string(),
            rendered: format!("{kind}:{name}:{}", Uuid::new_v4()),
        }
    }

    /// The rendered id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Name of the task body this invocation runs.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Kind of the task this invocation belongs to.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::window::DelayComponent;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn body() -> TaskBody {
        TaskBody::new("stats_disks", || Ok(()))
    }

    #[test]
    fn test_invocation_id_shape() {
        let id = InvocationId::new(TaskKind::Periodic, "stats_disks");
        let parts: Vec<&str> = id.as_str().splitn(3, ':').collect();
        assert_eq!(parts[0], "period");
        assert_eq!(parts[1], "stats_disks");
        assert!(Uuid::parse_str(parts[2]).is_ok());
        assert_ne!(id, InvocationId::new(TaskKind::Periodic, "stats_disks"));
        assert!(InvocationId::new(TaskKind::Delayed, "x").as_str().starts_with("delay:x:"));
        assert_eq!(id.task(), "stats_disks");
        assert_eq!(id.kind(), TaskKind::Periodic);
    }

    #[test]
    fn test_registration_validates_round_and_delay() {
        let err = Task::new(body(), TaskKind::Periodic, TimeUnit::Hour, TaskOptions::new().with_round(0));
        assert!(matches!(err, Err(SchedulerError::ScheduleComputation(_))));

        let err = Task::new(
            body(),
            TaskKind::Periodic,
            TimeUnit::Hour,
            TaskOptions::new().with_delay(Delay::none().with_hours(-1)),
        );
        assert!(matches!(err, Err(SchedulerError::ScheduleComputation(_))));
    }

    #[test]
    fn test_first_window_honours_run_immediately() {
        let now = NaiveDate::from_ymd_opt(2024, 5, 14).unwrap().and_hms_opt(9, 30, 0).unwrap();
        let task = Task::new(body(), TaskKind::Periodic, TimeUnit::Day, TaskOptions::new().run_immediately(true)).unwrap();
        assert_eq!(task.first_window(now).unwrap().next_run, now);

        let task = Task::new(body(), TaskKind::Periodic, TimeUnit::Day, TaskOptions::new()).unwrap();
        let next = task.first_window(now).unwrap().next_run;
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_lazy_delay_is_evaluated_every_period() {
        let minutes = Arc::new(AtomicI64::new(0));
        let source = Arc::clone(&minutes);
        let delay = Delay::none().with_minutes(DelayComponent::lazy(move || source.fetch_add(1, Ordering::SeqCst)));
        let task = Task::new(body(), TaskKind::Periodic, TimeUnit::Hour, TaskOptions::new().with_delay(delay)).unwrap();

        let now = NaiveDate::from_ymd_opt(2024, 5, 14).unwrap().and_hms_opt(9, 30, 0).unwrap();
        // registration consumed 0, the next two periods see 1 and 2
        assert_eq!(task.next_window(now).unwrap().next_run, now.date().and_hms_opt(10, 1, 0).unwrap());
        assert_eq!(task.next_window(now).unwrap().next_run, now.date().and_hms_opt(10, 2, 0).unwrap());
    }
}
