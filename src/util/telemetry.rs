//! Telemetry helpers for structured logging and tracing.
//!
//! Every line the scheduler emits has the shape
//! `<timestamp> - <source> - <level> - <message>`. Informational output goes
//! to stdout while warnings and errors go to stderr, so supervisors that only
//! capture stderr still see every failure.

use std::fmt as stdfmt;
use std::sync::OnceLock;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::writer::{MakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::util::clock::now_local;

/// Log source for scheduler, pool and shutdown lines.
pub const SCHEDULER: &str = "SCHEDULER";

/// Log source for per-invocation task lines.
pub const TASK: &str = "TASK";

/// Event formatter producing `<timestamp> - <source> - <level> - <message>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} - {} - {} - ",
            now_local().format("%Y-%m-%d %H:%M:%S"),
            meta.target(),
            meta.level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Reload handle for the filter of the subscriber installed by [`init_tracing`].
static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// `RUST_LOG` when present, otherwise `debug` or `info`.
fn level_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Plain-text fmt layer writing [`LineFormat`] lines to `writer`.
///
/// Colour codes are never emitted: lines usually end up in a pipe or a
/// journal, where they would break the line format.
pub fn line_layer<S, W>(writer: W) -> fmt::Layer<S, DefaultFields, LineFormat, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .event_format(LineFormat)
}

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs the line-protocol subscriber if none is set.
///
/// `RUST_LOG` wins when present; otherwise `debug` selects between the
/// `debug` and `info` levels. Calling it again swaps the level of the
/// subscriber it installed earlier, so every run gets the level it asked for.
pub fn init_tracing(debug: bool) {
    if let Some(handle) = FILTER.get() {
        if let Err(e) = handle.reload(level_filter(debug)) {
            tracing::warn!(target: SCHEDULER, error = %e, "Cannot change log level");
        }
        return;
    }
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    let (filter, handle) = reload::Layer::new(level_filter(debug));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(line_layer(writer))
        .try_init();
    if installed.is_ok() {
        let _ = FILTER.set(handle);
    }
}
