//! Scheduler configuration structure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler and worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads running task bodies.
    pub worker_count: usize,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
    /// Fine-grained polling interval near a run boundary, in milliseconds.
    pub poll_interval_ms: u64,
    /// Longest single sleep for day-scale waits, in seconds.
    pub hard_wait_chunk_secs: u64,
    /// Pause between a shutdown trigger and cancelling units, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Upper bound on waiting for cancelled units to finish, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            thread_stack_size: 2 * 1024 * 1024,
            poll_interval_ms: 200,
            hard_wait_chunk_secs: 3_600,
            shutdown_grace_ms: 1_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    /// Configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the fine-grained polling interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the longest single sleep for day-scale waits.
    #[must_use]
    pub const fn with_hard_wait_chunk_secs(mut self, secs: u64) -> Self {
        self.hard_wait_chunk_secs = secs;
        self
    }

    /// Set the shutdown grace pause.
    #[must_use]
    pub const fn with_shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.shutdown_grace_ms = ms;
        self
    }

    /// Set the bound on waiting for cancelled units.
    #[must_use]
    pub const fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    /// Fine-grained polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest single sleep for day-scale waits.
    #[must_use]
    pub const fn hard_wait_chunk(&self) -> Duration {
        Duration::from_secs(self.hard_wait_chunk_secs)
    }

    /// Shutdown grace pause.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Bound on waiting for cancelled units.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if self.hard_wait_chunk_secs == 0 {
            return Err("hard_wait_chunk_secs must be greater than 0".into());
        }
        if self.shutdown_timeout_ms == 0 {
            return Err("shutdown_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their default value.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SCHEDULER_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Recognized variables: `SCHEDULER_WORKERS`, `SCHEDULER_STACK_SIZE`,
    /// `SCHEDULER_POLL_INTERVAL_MS`, `SCHEDULER_HARD_WAIT_CHUNK_SECS`,
    /// `SCHEDULER_SHUTDOWN_GRACE_MS`, `SCHEDULER_SHUTDOWN_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable variable or invalid result.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable value or invalid result.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>, fallback: T) -> Result<T, String> {
            raw.map_or(Ok(fallback), |v| {
                v.trim()
                    .parse()
                    .map_err(|_| format!("{key}: cannot parse `{v}`"))
            })
        }

        let defaults = Self::default();
        let cfg = Self {
            worker_count: parse("SCHEDULER_WORKERS", lookup("SCHEDULER_WORKERS"), defaults.worker_count)?,
            thread_stack_size: parse(
                "SCHEDULER_STACK_SIZE",
                lookup("SCHEDULER_STACK_SIZE"),
                defaults.thread_stack_size,
            )?,
            poll_interval_ms: parse(
                "SCHEDULER_POLL_INTERVAL_MS",
                lookup("SCHEDULER_POLL_INTERVAL_MS"),
                defaults.poll_interval_ms,
            )?,
            hard_wait_chunk_secs: parse(
                "SCHEDULER_HARD_WAIT_CHUNK_SECS",
                lookup("SCHEDULER_HARD_WAIT_CHUNK_SECS"),
                defaults.hard_wait_chunk_secs,
            )?,
            shutdown_grace_ms: parse(
                "SCHEDULER_SHUTDOWN_GRACE_MS",
                lookup("SCHEDULER_SHUTDOWN_GRACE_MS"),
                defaults.shutdown_grace_ms,
            )?,
            shutdown_timeout_ms: parse(
                "SCHEDULER_SHUTDOWN_TIMEOUT_MS",
                lookup("SCHEDULER_SHUTDOWN_TIMEOUT_MS"),
                defaults.shutdown_timeout_ms,
            )?,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
