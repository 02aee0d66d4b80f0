//! Heartbeat exporter demo.
//!
//! Prints a heartbeat every two seconds and runs a pretend daily disk report
//! at 02:00 plus up to two hours of jitter. Stop it with Ctrl-C (exit code 0)
//! or `kill <pid>` (exit code 1).
//!
//! ```text
//! cargo run --example heartbeat -- --debug --run-now
//! ```

use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use periodic_exporter_scheduler::config::SchedulerConfig;
use periodic_exporter_scheduler::core::{
    AppResult, Delay, DelayComponent, RunOptions, Scheduler, TaskBody, TaskOptions, TimeUnit,
};

fn disk_report(volumes: &[&str]) -> AppResult<()> {
    for volume in volumes {
        println!("disk report: {volume} ok");
    }
    Ok(())
}

/// Heartbeat exporter demo: a 2-second heartbeat and a jittered daily report.
#[derive(Parser, Debug)]
#[command(name = "heartbeat", version, about)]
struct Cli {
    /// Emit debug lines and full failure detail.
    #[arg(long)]
    debug: bool,

    /// Run every task once right away instead of waiting for its first boundary.
    #[arg(long)]
    run_now: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (debug, run_now) = (cli.debug, cli.run_now);

    let config = match SchedulerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid scheduler configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut scheduler = match Scheduler::new(config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            eprintln!("cannot start scheduler: {e}");
            return ExitCode::FAILURE;
        }
    };

    let beats = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&beats);
    let registered = scheduler
        .add_periodic(
            TaskBody::new("heartbeat", move || {
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                println!("heartbeat #{n}");
                Ok(())
            }),
            TimeUnit::Second,
            TaskOptions::new().with_round(2).run_immediately(run_now),
        )
        .and_then(|()| {
            scheduler.add_periodic(
                TaskBody::with_args("disk_report", vec!["vda", "vdb"], |volumes| disk_report(volumes)),
                TimeUnit::Day,
                TaskOptions::new()
                    .run_immediately(run_now)
                    .with_delay(Delay::none().with_hours(2).with_minutes(DelayComponent::jitter(0..120))),
            )
        });
    if let Err(e) = registered {
        eprintln!("cannot register tasks: {e}");
        return ExitCode::FAILURE;
    }

    scheduler.run(RunOptions::new().debug(debug)).into()
}
