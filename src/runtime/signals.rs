//! OS signal listeners feeding shutdown triggers to the loop.

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::debug;

use crate::core::{ExitSignal, ShutdownTrigger};
use crate::util::telemetry::SCHEDULER;

/// Spawn one listener per [`ExitSignal`] into `set`.
///
/// Each listener owns its signal identity by value, so the trigger it sends
/// always names the signal it was registered for.
///
/// # Errors
///
/// Returns the I/O error raised when a handler cannot be registered.
#[cfg(unix)]
pub fn spawn_signal_listeners(
    set: &mut JoinSet<()>,
    triggers: &UnboundedSender<ShutdownTrigger>,
) -> Result<(), std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    for exit_signal in ExitSignal::ALL {
        let kind = match exit_signal {
            ExitSignal::Hangup => SignalKind::hangup(),
            ExitSignal::Terminate => SignalKind::terminate(),
            ExitSignal::Interrupt => SignalKind::interrupt(),
        };
        let mut stream = signal(kind)?;
        let tx = triggers.clone();
        set.spawn(async move {
            while stream.recv().await.is_some() {
                debug!(target: SCHEDULER, signal = %exit_signal, "Signal caught");
                if tx.send(ShutdownTrigger::Signal(exit_signal)).is_err() {
                    break;
                }
            }
        });
    }
    Ok(())
}

/// Spawn a Ctrl-C listener into `set`; other signals do not exist here.
///
/// # Errors
///
/// Never fails on this platform; the signature matches the unix version.
#[cfg(not(unix))]
pub fn spawn_signal_listeners(
    set: &mut JoinSet<()>,
    triggers: &UnboundedSender<ShutdownTrigger>,
) -> Result<(), std::io::Error> {
    let tx = triggers.clone();
    set.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!(target: SCHEDULER, signal = %ExitSignal::Interrupt, "Signal caught");
            if tx.send(ShutdownTrigger::Signal(ExitSignal::Interrupt)).is_err() {
                break;
            }
        }
    });
    Ok(())
}
