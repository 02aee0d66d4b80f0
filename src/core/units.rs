//! Cooperative units owned by the scheduling loop.

use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::SchedulerError;
use crate::util::telemetry::SCHEDULER;

/// Every future the loop has spawned, grouped by role.
///
/// Keeping them in loop-owned sets is what lets shutdown enumerate and
/// cancel all of them without a global task registry.
#[derive(Default)]
pub(crate) struct CooperativeUnits {
    /// One per registered task.
    pub tasks: JoinSet<Result<(), SchedulerError>>,
    /// One per in-flight dispatch, reporting its outcome.
    pub watchers: JoinSet<()>,
    /// OS signal listeners.
    pub listeners: JoinSet<()>,
}

impl CooperativeUnits {
    /// Number of live units of every role.
    pub fn len(&self) -> usize {
        self.tasks.len() + self.watchers.len() + self.listeners.len()
    }

    /// Whether the run's own work is finished (listeners do not count).
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.watchers.is_empty()
    }

    /// Cancel every unit and wait, at most `timeout`, for them to unwind.
    ///
    /// A unit that was already cancelled or already finished counts as done.
    /// Returns the number of units that were still running and got cancelled.
    pub async fn cancel_all(&mut self, timeout: Duration) -> usize {
        self.tasks.abort_all();
        self.watchers.abort_all();
        self.listeners.abort_all();

        let gather = async {
            let mut cancelled = 0;
            while let Some(res) = self.tasks.join_next().await {
                match res {
                    Err(e) if e.is_cancelled() => cancelled += 1,
                    Err(e) => debug!(target: SCHEDULER, error = %e, "Task unit panicked while cancelling"),
                    Ok(_) => {}
                }
            }
            while let Some(res) = self.watchers.join_next().await {
                if matches!(res, Err(ref e) if e.is_cancelled()) {
                    cancelled += 1;
                }
            }
            while let Some(res) = self.listeners.join_next().await {
                if matches!(res, Err(ref e) if e.is_cancelled()) {
                    cancelled += 1;
                }
            }
            cancelled
        };

        let gathered = tokio::time::timeout(timeout, gather).await;
        gathered.unwrap_or_else(|_| {
            warn!(target: SCHEDULER, ?timeout, "Timed out waiting for units to cancel");
            self.tasks.detach_all();
            self.watchers.detach_all();
            self.listeners.detach_all();
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_all_counts_pending_units() {
        let mut units = CooperativeUnits::default();
        units.tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(())
        });
        units.watchers.spawn(std::future::pending());
        units.listeners.spawn(std::future::pending());
        assert_eq!(units.len(), 3);
        assert!(!units.is_idle());

        let cancelled = units.cancel_all(Duration::from_secs(1)).await;
        assert_eq!(cancelled, 3);
        assert_eq!(units.len(), 0);

        // cancelling an empty set is a no-op
        assert_eq!(units.cancel_all(Duration::from_secs(1)).await, 0);
    }
}
