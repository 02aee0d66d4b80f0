//! Wall-clock helpers.
//!
//! Scheduling decisions are made against naive local time so that windows
//! line up with the host's midnight, the same reference operators use when
//! they say "every day at 5am".

use chrono::{Local, NaiveDateTime, NaiveTime, Timelike, Utc};

/// Current local time without timezone information.
#[must_use]
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Midnight at the start of the day containing `at`.
#[must_use]
pub fn midnight(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_time(NaiveTime::MIN)
}

/// `at` with the sub-second part dropped.
#[must_use]
pub fn truncate_to_second(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
