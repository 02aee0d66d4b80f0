//! Tokio runtime hosting the scheduling loop.

use tokio::runtime::{Builder, Runtime};

/// Build the single-threaded runtime the scheduling loop runs on.
///
/// Every timing decision happens on this one thread, so scheduling state
/// needs no locking. Blocking task bodies never run here; they go to the
/// worker pool.
///
/// # Errors
///
/// Returns the I/O error raised while creating the timer or signal drivers.
pub fn build_loop_runtime() -> Result<Runtime, std::io::Error> {
    Builder::new_current_thread()
        .thread_name("scheduler-loop")
        .enable_all()
        .build()
}
