// src/core/tasks/calendar.rs

//! Five-field cron expressions evaluated at minute granularity.
//!
//! Fields are `minute hour day-of-month month day-of-week`. Each field accepts
//! `*`, single values, `a-b` ranges, `/n` steps and comma lists. Months and
//! weekdays also accept three-letter names, and day-of-week `7` means Sunday.
//! When both day fields are restricted a day matches if either does.

use crate::core::MudlinkError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike};
use std::fmt;
use std::str::FromStr;

/// How many years ahead `next_after` searches before giving up.
const SEARCH_HORIZON_YEARS: i32 = 5;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// The set of allowed values of one field, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1 << value) != 0
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// The offset added to a name's index to get its value.
    name_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    name_base: 1,
};
// 7 is accepted here and folded onto 0 after parsing.
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    name_base: 0,
};

impl FieldSpec {
    fn invalid(&self, field: &str) -> MudlinkError {
        MudlinkError::InvalidSchedule(format!("invalid {} field '{}'", self.name, field))
    }

    fn value(&self, raw: &str, field: &str) -> Result<u32, MudlinkError> {
        let lowered = raw.to_ascii_lowercase();
        let value = match self.names.iter().position(|n| *n == lowered) {
            Some(index) => index as u32 + self.name_base,
            None => raw.parse::<u32>().map_err(|_| self.invalid(field))?,
        };
        if value < self.min || value > self.max {
            return Err(self.invalid(field));
        }
        Ok(value)
    }

    /// Parses a whole field. Returns the set and whether it was a bare `*`.
    fn parse(&self, field: &str) -> Result<(FieldSet, bool), MudlinkError> {
        if field == "*" {
            return Ok((self.range(self.min, self.max, 1), true));
        }
        let mut set = FieldSet(0);
        for item in field.split(',') {
            let (base, step) = match item.split_once('/') {
                Some((base, step)) => {
                    let step = step.parse::<u32>().map_err(|_| self.invalid(field))?;
                    if step == 0 || step > self.max - self.min {
                        return Err(self.invalid(field));
                    }
                    (base, Some(step))
                }
                None => (item, None),
            };
            let (start, end) = if base == "*" {
                (self.min, self.max)
            } else if let Some((lo, hi)) = base.split_once('-') {
                (self.value(lo, field)?, self.value(hi, field)?)
            } else {
                let start = self.value(base, field)?;
                // `5/15` runs from 5 to the end of the field.
                (start, if step.is_some() { self.max } else { start })
            };
            if start > end {
                return Err(self.invalid(field));
            }
            set.0 |= self.range(start, end, step.unwrap_or(1)).0;
        }
        Ok((set, false))
    }

    fn range(&self, start: u32, end: u32, step: u32) -> FieldSet {
        let mut bits = 0u64;
        let mut v = start;
        while v <= end {
            bits |= 1 << v;
            match v.checked_add(step) {
                Some(next) => v = next,
                None => break,
            }
        }
        FieldSet(bits)
    }
}

/// A parsed calendar schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSchedule {
    source: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    any_day_of_month: bool,
    any_day_of_week: bool,
}

impl CalendarSchedule {
    pub fn parse(expression: &str) -> Result<Self, MudlinkError> {
        let trimmed = expression.trim();
        let expanded = match trimmed.to_ascii_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            _ if trimmed.starts_with('@') => {
                return Err(MudlinkError::InvalidSchedule(format!(
                    "unknown schedule alias '{trimmed}'"
                )));
            }
            _ => trimmed,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields[..] else {
            return Err(MudlinkError::InvalidSchedule(format!(
                "expected 5 fields, got {} in '{}'",
                fields.len(),
                trimmed
            )));
        };

        let (minutes, _) = MINUTE.parse(minute)?;
        let (hours, _) = HOUR.parse(hour)?;
        let (days_of_month, any_day_of_month) = DAY_OF_MONTH.parse(dom)?;
        let (months, _) = MONTH.parse(month)?;
        let (mut days_of_week, any_day_of_week) = DAY_OF_WEEK.parse(dow)?;
        if days_of_week.contains(7) {
            days_of_week.0 = (days_of_week.0 & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            any_day_of_month,
            any_day_of_week,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());
        match (self.any_day_of_month, self.any_day_of_week) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// Returns true if the schedule fires at the minute containing `at`.
    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        self.months.contains(at.month())
            && self.day_matches(at.date())
            && self.hours.contains(at.hour())
            && self.minutes.contains(at.minute())
    }

    /// The first firing strictly after `after`, in `after`'s time zone.
    ///
    /// Local times skipped by a daylight-saving jump never fire; a repeated
    /// local time fires at its earlier instance.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut t = after
            .naive_local()
            .with_second(0)?
            .with_nanosecond(0)?
            .checked_add_signed(TimeDelta::minutes(1))?;
        let horizon = t.year() + SEARCH_HORIZON_YEARS;

        while t.year() <= horizon {
            if !self.months.contains(t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.contains(t.hour()) {
                t = t.with_minute(0)?.checked_add_signed(TimeDelta::hours(1))?;
                continue;
            }
            if !self.minutes.contains(t.minute()) {
                t = t.checked_add_signed(TimeDelta::minutes(1))?;
                continue;
            }
            if let Some(candidate) = tz.from_local_datetime(&t).earliest() {
                if candidate > *after {
                    return Some(candidate);
                }
            }
            t = t.checked_add_signed(TimeDelta::minutes(1))?;
        }
        None
    }
}

impl FromStr for CalendarSchedule {
    type Err = MudlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CalendarSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
