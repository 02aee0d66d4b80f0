//! Tokio runtime adapters: the loop runtime and OS signal listeners.

pub mod signals;
pub mod tokio_runtime;

pub use signals::spawn_signal_listeners;
pub use tokio_runtime::build_loop_runtime;
