//! Tests for error types

use periodic_exporter_scheduler::core::{ErrorKind, FailureReport, PoolError, SchedulerError};

#[test]
fn test_schedule_computation_error() {
    let err = SchedulerError::ScheduleComputation("round must be a positive integer".to_string());
    assert_eq!(format!("{err}"), "schedule computation failed: round must be a positive integer");
}

#[test]
fn test_pool_error_converts() {
    let err: SchedulerError = PoolError::PoolShutdown.into();
    assert_eq!(format!("{err}"), "worker pool error: pool has been shut down");
    assert_eq!(FailureReport::from_scheduler_error(&err).kind, ErrorKind::LoopFatal);
}

#[test]
fn test_failure_report_display() {
    let err = SchedulerError::ScheduleComputation("delay overflows".to_string());
    let report = FailureReport::from_scheduler_error(&err);
    assert_eq!(report.kind, ErrorKind::ScheduleComputation);
    assert_eq!(
        report.to_string(),
        "ScheduleComputationError: schedule computation failed: delay overflows"
    );
    assert!(report.render().starts_with("ScheduleComputationError: "));
}

#[test]
fn test_failure_report_from_task_error() {
    let err = anyhow::anyhow!("exit status 2").context("running ceph df");
    let report = FailureReport::from_task_error(&err);
    assert_eq!(report.kind, ErrorKind::TaskExecution);
    assert_eq!(report.message, "running ceph df");
    assert!(report.detail.contains("exit status 2"));
}
