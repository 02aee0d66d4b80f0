//! Cooperative waits until a run boundary.
//!
//! A single computed sleep drifts when the loop is busy or the host clock is
//! adjusted, so waits are two-phase: a coarse sleep for the precomputed
//! duration, then short polls of the wall clock until the boundary has
//! actually passed.

use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::core::window::{ScheduleWindow, TimeUnit};
use crate::util::clock::now_local;
use crate::util::telemetry::SCHEDULER;

/// Poll and chunk sizes for boundary waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Interval of the fine-grained phase.
    pub poll_interval: Duration,
    /// Longest single sleep for day-scale waits.
    pub hard_wait_chunk: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            hard_wait_chunk: Duration::from_secs(3_600),
        }
    }
}

impl WaitPolicy {
    /// Wait for `window`, chunking the coarse phase for day-unit tasks.
    pub async fn wait_for(&self, window: &ScheduleWindow, unit: TimeUnit) {
        if unit == TimeUnit::Day {
            self.hard_wait(window.next_run, window.wait).await;
        } else {
            self.wait_until(window.next_run, window.wait).await;
        }
    }

    /// Sleep `coarse`, then poll until the wall clock is past `next_run`.
    pub async fn wait_until(&self, next_run: NaiveDateTime, coarse: Duration) {
        tokio::time::sleep(coarse).await;
        while now_local() <= next_run {
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Like [`wait_until`](Self::wait_until) but never sleeps longer than one
    /// chunk at a time, logging a heartbeat between chunks.
    pub async fn hard_wait(&self, next_run: NaiveDateTime, mut coarse: Duration) {
        while coarse > self.hard_wait_chunk {
            tokio::time::sleep(self.hard_wait_chunk).await;
            coarse = coarse.saturating_sub(self.hard_wait_chunk);
            debug!(target: SCHEDULER, "Heartbeat");
        }
        self.wait_until(next_run, coarse).await;
    }
}
