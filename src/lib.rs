//! # Periodic Exporter Scheduler
//!
//! A scheduler for periodic and delayed jobs in long-running metrics
//! exporters.
//!
//! Tasks are registered with a time unit (second, minute, hour or day), a
//! round multiplier and an optional delay offset. Each periodic task fires
//! on every `round * unit` boundary measured from local midnight, shifted by
//! its delay. Delayed tasks fire once. Bodies run on a fixed-size pool of
//! worker threads, so a slow body never holds up the scheduling of others.
//!
//! ## Key Features
//!
//! - **Aligned windows**: runs land on wall-clock boundaries, not on
//!   "interval since start", so a restart does not shift the schedule
//! - **Fresh jitter**: delay components can be re-evaluated for every window
//! - **Failure isolation**: a failing body is logged and nothing else happens
//! - **Signal-driven shutdown**: `SIGHUP`/`SIGTERM` stop with exit code 1,
//!   `SIGINT` stops with exit code 0
//!
//! ```rust,ignore
//! use periodic_exporter_scheduler::config::SchedulerConfig;
//! use periodic_exporter_scheduler::core::{RunOptions, Scheduler, TaskBody, TaskOptions, TimeUnit};
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::from_env()?)?;
//! scheduler.add_periodic(
//!     TaskBody::new("heartbeat", || { println!("alive"); Ok(()) }),
//!     TimeUnit::Second,
//!     TaskOptions::new().with_round(2),
//! )?;
//! let status = scheduler.run(RunOptions::default());
//! std::process::exit(status.code());
//! ```
//!
//! See `demos/heartbeat.rs` for a runnable program.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling core: windows, tasks, the worker pool and the loop.
pub mod core;
/// Configuration for the pool, waits and shutdown.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Tokio runtime and signal adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
