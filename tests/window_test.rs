//! Integration tests for window computation.
//!
//! Every case pins `now` to a fixed instant so results do not depend on the
//! host clock.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use periodic_exporter_scheduler::core::{compute_next_run, Delay, DelayComponent, Task, TaskBody, TaskKind, TaskOptions, TimeUnit};

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(h, m, s).unwrap()
}

fn next_day(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(h, m, s).unwrap()
}

// ============================================================================
// BOUNDARY ALIGNMENT
// ============================================================================

#[test]
fn test_minute_aligns_to_next_minute() {
    let window = compute_next_run(at(10, 0, 17), TimeUnit::Minute, 1, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, at(10, 1, 0));
    assert_eq!(window.wait, Duration::from_secs(43));
}

#[test]
fn test_hour_with_delay() {
    let window = compute_next_run(at(13, 58, 0), TimeUnit::Hour, 1, Duration::from_secs(5 * 60)).unwrap();
    assert_eq!(window.next_run, at(14, 5, 0));
    assert_eq!(window.wait, Duration::from_secs(7 * 60));
}

#[test]
fn test_day_with_delay_lands_next_morning() {
    let window = compute_next_run(at(9, 0, 0), TimeUnit::Day, 1, Duration::from_secs(5 * 3600)).unwrap();
    assert_eq!(window.next_run, next_day(5, 0, 0));
    assert_eq!(window.wait, Duration::from_secs(20 * 3600));
}

#[test]
fn test_delay_not_shorter_than_window_is_ignored() {
    let exact = compute_next_run(at(10, 0, 17), TimeUnit::Minute, 1, Duration::from_secs(60)).unwrap();
    assert_eq!(exact.next_run, at(10, 1, 0));

    let longer = compute_next_run(at(10, 0, 17), TimeUnit::Minute, 1, Duration::from_secs(90)).unwrap();
    assert_eq!(longer.next_run, at(10, 1, 0));

    let shorter = compute_next_run(at(10, 0, 17), TimeUnit::Minute, 1, Duration::from_secs(59)).unwrap();
    assert_eq!(shorter.next_run, at(10, 1, 59));
}

#[test]
fn test_round_multiplies_the_window() {
    // 20-minute windows counted from midnight: :00, :20, :40
    let window = compute_next_run(at(10, 7, 3), TimeUnit::Minute, 20, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, at(10, 20, 0));

    let window = compute_next_run(at(10, 45, 0), TimeUnit::Minute, 20, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, at(11, 0, 0));

    let window = compute_next_run(at(10, 0, 1), TimeUnit::Second, 2, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, at(10, 0, 2));
}

#[test]
fn test_exact_boundary_moves_to_next_window() {
    let window = compute_next_run(at(10, 1, 0), TimeUnit::Minute, 1, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, at(10, 2, 0));

    let window = compute_next_run(at(0, 0, 0), TimeUnit::Day, 1, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, next_day(0, 0, 0));
}

#[test]
fn test_subsecond_now_keeps_whole_second_run() {
    let now = at(10, 0, 17).with_nanosecond(750_000_000).unwrap();
    let window = compute_next_run(now, TimeUnit::Minute, 1, Duration::ZERO).unwrap();
    assert_eq!(window.next_run, at(10, 1, 0));
    assert_eq!(window.wait, Duration::from_millis(42_250));
}

#[test]
fn test_zero_round_fails() {
    assert!(compute_next_run(at(10, 0, 0), TimeUnit::Hour, 0, Duration::ZERO).is_err());
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn test_computation_is_deterministic() {
    let now = at(17, 33, 41);
    for unit in [TimeUnit::Second, TimeUnit::Minute, TimeUnit::Hour, TimeUnit::Day] {
        let a = compute_next_run(now, unit, 3, Duration::from_secs(1)).unwrap();
        let b = compute_next_run(now, unit, 3, Duration::from_secs(1)).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_next_run_is_strictly_future_and_within_one_window() {
    let units = [TimeUnit::Second, TimeUnit::Minute, TimeUnit::Hour, TimeUnit::Day];
    for unit in units {
        for round in [1_u32, 2, 7, 20] {
            for delay_secs in [0_u64, 1, 59, 3_600] {
                for (h, m, s) in [(0, 0, 0), (9, 59, 59), (13, 58, 0), (23, 59, 59)] {
                    let now = at(h, m, s);
                    let window = compute_next_run(now, unit, round, Duration::from_secs(delay_secs)).unwrap();
                    let span = u64::from(round) * unit.seconds();

                    assert!(window.next_run > now, "{unit} x{round} +{delay_secs}s at {now}");
                    assert!(window.wait.as_secs() < 2 * span);
                    assert_eq!(window.next_run.nanosecond(), 0);
                }
            }
        }
    }
}

// ============================================================================
// TASK WINDOWS
// ============================================================================

#[test]
fn test_run_immediately_only_affects_first_window() {
    let task = Task::new(
        TaskBody::new("stats_disks", || Ok(())),
        TaskKind::Periodic,
        TimeUnit::Minute,
        TaskOptions::new().run_immediately(true),
    )
    .unwrap();

    let first = task.first_window(at(10, 0, 17)).unwrap();
    assert_eq!(first.next_run, at(10, 0, 17));
    assert_eq!(first.wait, Duration::ZERO);

    let second = task.next_window(at(10, 0, 17)).unwrap();
    assert_eq!(second.next_run, at(10, 1, 0));
}

#[test]
fn test_jittered_delay_stays_inside_window() {
    let task = Task::new(
        TaskBody::new("stats_pools", || Ok(())),
        TaskKind::Periodic,
        TimeUnit::Day,
        TaskOptions::new().with_delay(Delay::none().with_hours(2).with_minutes(DelayComponent::jitter(0..120))),
    )
    .unwrap();

    for _ in 0..50 {
        let window = task.next_window(at(9, 0, 0)).unwrap();
        assert!(window.next_run >= next_day(2, 0, 0));
        assert!(window.next_run < next_day(4, 0, 0));
        assert_eq!(window.next_run.second(), 0);
    }
}
