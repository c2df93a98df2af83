use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::context::LoanContext;
use crate::errors::{LoanError, Result};
use crate::types::is_leap_year;

/// 2099-01-01T00:00:00Z, the sentinel for schedules held open indefinitely
const END_OF_TIME_TIMESTAMP: i64 = 4_070_908_800;

pub fn end_of_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(END_OF_TIME_TIMESTAMP, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// when a scheduled event fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleExpression {
    /// every month on `day` (clamped to the month length)
    Monthly {
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    },
    OneOff(DateTime<Utc>),
    /// never fires, keeps the schedule registered
    EndOfTime,
}

impl ScheduleExpression {
    pub fn one_off_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ScheduleExpression::OneOff(at) => Some(*at),
            ScheduleExpression::EndOfTime => Some(end_of_time()),
            ScheduleExpression::Monthly { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// None lets the host pick the start, e.g. on conversion
    pub start: Option<DateTime<Utc>>,
    pub expression: ScheduleExpression,
}

impl ScheduledEvent {
    pub fn new(start: DateTime<Utc>, expression: ScheduleExpression) -> Self {
        Self {
            start: Some(start),
            expression,
        }
    }

    pub fn end_of_time(start: DateTime<Utc>) -> Self {
        Self::new(start, ScheduleExpression::EndOfTime)
    }
}

/// change to an already registered schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDirective {
    pub event_type: String,
    pub expression: ScheduleExpression,
    pub skip: bool,
}

/// monthly event using the `{prefix}_day` and time parameters
pub fn monthly_scheduled_event(
    ctx: &LoanContext<'_>,
    start: DateTime<Utc>,
    prefix: &str,
    default_day: u32,
) -> Result<ScheduledEvent> {
    let day = ctx.get_int_or(&format!("{prefix}_day"), None, i64::from(default_day))?;
    let day = u32::try_from(day)
        .ok()
        .filter(|d| (1..=31).contains(d))
        .ok_or_else(|| LoanError::InvalidParameter {
            name: format!("{prefix}_day"),
            message: format!("{day} is not a day of the month"),
        })?;
    let (hour, minute, second) = ctx.schedule_time(prefix)?;
    Ok(ScheduledEvent::new(
        start,
        ScheduleExpression::Monthly {
            day,
            hour,
            minute,
            second,
        },
    ))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn out_of_range(what: &str, dt: DateTime<Utc>) -> LoanError {
    LoanError::CalculationError {
        message: format!("{what} out of range for {dt}"),
    }
}

/// shift by whole months, clamping to the last day of shorter months
pub fn add_months(dt: DateTime<Utc>, months: i32) -> Result<DateTime<Utc>> {
    let shifted = if months >= 0 {
        dt.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        dt.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| out_of_range("month shift", dt))
}

/// move to `day` of the same month, clamped to the month length
pub fn with_day_clamped(dt: DateTime<Utc>, day: u32) -> Result<DateTime<Utc>> {
    let day = day.clamp(1, days_in_month(dt.year(), dt.month()));
    dt.with_day(day).ok_or_else(|| out_of_range("day", dt))
}

pub fn with_time(dt: DateTime<Utc>, hour: u32, minute: u32, second: u32) -> Result<DateTime<Utc>> {
    dt.date_naive()
        .and_hms_opt(hour, minute, second)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| out_of_range("time of day", dt))
}

pub fn midnight(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    with_time(dt, 0, 0, 0)
}

/// whole calendar months from `start` to `end`, time of day included
///
/// a month only counts once `start` shifted by it (end-of-month clamped) is
/// not after `end`, so 31 Jan to 28 Feb 2020 is zero months.
pub fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u32> {
    if end <= start {
        return Ok(0);
    }
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    while months > 0 && add_months(start, months)? > end {
        months -= 1;
    }
    Ok(months.max(0) as u32)
}
