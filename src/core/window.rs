//! Aligned run-time computation.
//!
//! A task runs on boundaries of a window that is `round` units long, counted
//! from local midnight. An optional extra delay shifts the run inside the
//! window, e.g. a daily task with a 5 hour delay runs at 05:00.
//!
//! ```rust,ignore
//! use periodic_exporter_scheduler::core::{compute_next_run, TimeUnit};
//!
//! // 10:00:17 -> next minute boundary is 10:01:00
//! let window = compute_next_run(now, TimeUnit::Minute, 1, Duration::ZERO)?;
//! ```

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::clock::{midnight, truncate_to_second};

/// Recurrence granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// One second.
    Second,
    /// Sixty seconds.
    Minute,
    /// One hour.
    Hour,
    /// One day.
    Day,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    #[must_use]
    pub const fn seconds(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "second" => Ok(Self::Second),
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            other => Err(SchedulerError::ScheduleComputation(format!(
                "unknown unit `{other}`, expected second, minute, hour or day"
            ))),
        }
    }
}

/// One component of an extra delay, either fixed or evaluated every period.
#[derive(Clone)]
pub enum DelayComponent {
    /// Fixed amount.
    Fixed(i64),
    /// Evaluated each time the delay is resolved.
    Lazy(Arc<dyn Fn() -> i64 + Send + Sync>),
}

impl DelayComponent {
    /// Uniformly random amount in `range`, drawn again every period.
    #[must_use]
    pub fn jitter(range: Range<i64>) -> Self {
        if range.is_empty() {
            return Self::Fixed(range.start);
        }
        Self::Lazy(Arc::new(move || rand::rng().random_range(range.clone())))
    }

    /// Lazily evaluated component.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Self::Lazy(Arc::new(f))
    }

    fn resolve(&self) -> i64 {
        match self {
            Self::Fixed(v) => *v,
            Self::Lazy(f) => f(),
        }
    }
}

impl From<i64> for DelayComponent {
    fn from(value: i64) -> Self {
        Self::Fixed(value)
    }
}

impl fmt::Debug for DelayComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(v) => write!(f, "Fixed({v})"),
            Self::Lazy(_) => write!(f, "Lazy(..)"),
        }
    }
}

/// Extra delay applied inside a window, made of day/hour/minute/second parts.
#[derive(Debug, Clone, Default)]
pub struct Delay {
    days: Option<DelayComponent>,
    hours: Option<DelayComponent>,
    minutes: Option<DelayComponent>,
    seconds: Option<DelayComponent>,
}

impl Delay {
    /// No extra delay.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the days component.
    #[must_use]
    pub fn with_days(mut self, days: impl Into<DelayComponent>) -> Self {
        self.days = Some(days.into());
        self
    }

    /// Set the hours component.
    #[must_use]
    pub fn with_hours(mut self, hours: impl Into<DelayComponent>) -> Self {
        self.hours = Some(hours.into());
        self
    }

    /// Set the minutes component.
    #[must_use]
    pub fn with_minutes(mut self, minutes: impl Into<DelayComponent>) -> Self {
        self.minutes = Some(minutes.into());
        self
    }

    /// Set the seconds component.
    #[must_use]
    pub fn with_seconds(mut self, seconds: impl Into<DelayComponent>) -> Self {
        self.seconds = Some(seconds.into());
        self
    }

    /// Whether no component is set.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.days.is_none() && self.hours.is_none() && self.minutes.is_none() && self.seconds.is_none()
    }

    /// Evaluate every component and sum them into a duration.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ScheduleComputation` if the total overflows or
    /// is negative.
    pub fn resolve(&self) -> Result<Duration, SchedulerError> {
        let parts = [
            (&self.days, TimeUnit::Day),
            (&self.hours, TimeUnit::Hour),
            (&self.minutes, TimeUnit::Minute),
            (&self.seconds, TimeUnit::Second),
        ];

        let mut total: i64 = 0;
        for (component, unit) in parts {
            let Some(component) = component else { continue };
            #[allow(clippy::cast_possible_wrap)]
            let part = component
                .resolve()
                .checked_mul(unit.seconds() as i64)
                .ok_or_else(|| SchedulerError::ScheduleComputation(format!("{unit} delay overflows")))?;
            total = total
                .checked_add(part)
                .ok_or_else(|| SchedulerError::ScheduleComputation("delay overflows".into()))?;
        }

        u64::try_from(total).map(Duration::from_secs).map_err(|_| {
            SchedulerError::ScheduleComputation(format!("delay resolves to negative duration ({total}s)"))
        })
    }
}

/// Next aligned run time and how long to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// Absolute local time of the next run, whole seconds.
    pub next_run: NaiveDateTime,
    /// Time from the computation instant until `next_run`.
    pub wait: Duration,
}

impl ScheduleWindow {
    /// Window for a task that should run as soon as possible.
    #[must_use]
    pub fn immediate(now: NaiveDateTime) -> Self {
        Self {
            next_run: truncate_to_second(now),
            wait: Duration::ZERO,
        }
    }
}

/// Compute the next run aligned to a `round * unit` window counted from midnight.
///
/// A `delay` that is not shorter than the window is ignored so a run never
/// overshoots into the window after next.
///
/// # Errors
///
/// Returns `SchedulerError::ScheduleComputation` if `round` is zero or the
/// window does not fit the calendar.
pub fn compute_next_run(
    now: NaiveDateTime,
    unit: TimeUnit,
    round: u32,
    delay: Duration,
) -> Result<ScheduleWindow, SchedulerError> {
    if round == 0 {
        return Err(SchedulerError::ScheduleComputation(
            "round must be a positive integer".into(),
        ));
    }

    let window = u64::from(round) * unit.seconds();
    let elapsed = u64::from(now.num_seconds_from_midnight());
    let boundary = (elapsed + window) / window * window;
    let delay = if delay.as_secs() >= window { 0 } else { delay.as_secs() };

    let offset = i64::try_from(boundary + delay)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| SchedulerError::ScheduleComputation(format!("window of {round} {unit} is too large")))?;
    let next_run = midnight(now)
        .checked_add_signed(offset)
        .ok_or_else(|| SchedulerError::ScheduleComputation("next run is out of calendar range".into()))?;

    let wait = (next_run - now)
        .to_std()
        .map_err(|e| SchedulerError::ScheduleComputation(format!("next run is not in the future: {e}")))?;

    Ok(ScheduleWindow { next_run, wait })
}
