//! Task bodies executed on worker threads.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::core::error::{AppResult, ErrorKind, FailureReport};

/// Callable run on a worker thread, with its positional arguments bound in.
///
/// Bodies are synchronous: they are expected to block (shelling out to disk
/// tools, parsing files) and therefore never run on the scheduling loop.
/// A body owns its own error handling and retry policy. The scheduler logs a
/// failure and moves on to the next period.
///
/// # Example
///
/// ```rust,ignore
/// use periodic_exporter_scheduler::core::TaskBody;
///
/// let body = TaskBody::with_args("stats_disks", volumes, |volumes| {
///     probe(volumes)?;
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct TaskBody {
    name: Arc<str>,
    call: Arc<dyn Fn() -> AppResult<()> + Send + Sync>,
}

impl TaskBody {
    /// Body without arguments.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            call: Arc::new(f),
        }
    }

    /// Body called with a reference to `args` on every invocation.
    pub fn with_args<A, F>(name: impl Into<String>, args: A, f: F) -> Self
    where
        A: Send + Sync + 'static,
        F: Fn(&A) -> AppResult<()> + Send + Sync + 'static,
    {
        Self::new(name, move || f(&args))
    }

    /// Name used in invocation ids and log lines.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the body, converting both errors and panics into a report.
    ///
    /// # Errors
    ///
    /// Returns a `TaskExecution` report if the body returned an error or panicked.
    pub fn invoke(&self) -> Result<(), FailureReport> {
        match catch_unwind(AssertUnwindSafe(|| (self.call)())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(FailureReport::from_task_error(&err)),
            Err(payload) => Err(FailureReport::from_panic(ErrorKind::TaskExecution, payload.as_ref())),
        }
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBody").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_body_receives_args() {
        let seen = Arc::new(AtomicUsize::new(0));
        let body = TaskBody::with_args("count", (Arc::clone(&seen), 3_usize), |(seen, step)| {
            seen.fetch_add(*step, Ordering::SeqCst);
            Ok(())
        });

        body.invoke().unwrap();
        body.invoke().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 6);
        assert_eq!(body.name(), "count");
    }

    #[test]
    fn test_body_error_becomes_report() {
        let body = TaskBody::new("broken", || anyhow::bail!("metadata unavailable"));
        let report = body.invoke().unwrap_err();
        assert_eq!(report.kind, ErrorKind::TaskExecution);
        assert_eq!(report.message, "metadata unavailable");
    }

    #[test]
    fn test_body_panic_is_caught() {
        let body = TaskBody::new("panics", || panic!("index out of range"));
        let report = body.invoke().unwrap_err();
        assert_eq!(report.message, "index out of range");
    }
}
