//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, A-B, A-B/N and comma lists of those.
//! Example: "0 9 * * *" = every day at 09:00.
//! Day of week is 0-6 with Sunday = 0 (7 is accepted as Sunday too).

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike};
use datekeeper_core::{DateKeeperError, Result};

/// A parsed cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_any: bool,
    dow_any: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(DateKeeperError::Config(format!(
                "Invalid cron expression '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }
        let field = |idx: usize, name: &str, min: u32, max: u32| {
            parse_field(parts[idx], min, max).ok_or_else(|| {
                DateKeeperError::Config(format!("Invalid {name} field '{}' in cron '{expression}'", parts[idx]))
            })
        };

        let mut days_of_week = field(4, "day-of-week", 0, 7)?;
        // 7 and 0 are both Sunday.
        for d in days_of_week.iter_mut() {
            if *d == 7 {
                *d = 0;
            }
        }
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Ok(Self {
            expression: expression.trim().to_string(),
            minutes: field(0, "minute", 0, 59)?,
            hours: field(1, "hour", 0, 23)?,
            days_of_month: field(2, "day-of-month", 1, 31)?,
            months: field(3, "month", 1, 12)?,
            days_of_week,
            dom_any: parts[2] == "*",
            dow_any: parts[4] == "*",
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Standard cron day matching: when both day fields are restricted,
    /// either one matching is enough.
    fn matches_date(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self.days_of_week.contains(&date.weekday().num_days_from_sunday());
        match (self.dom_any, self.dow_any) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// First matching minute strictly after `after`, in `after`'s time zone.
    /// Searches up to ~4 years ahead (covers Feb 29 schedules).
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let local = after.naive_local();
        let start_date = local.date();

        for offset in 0..(366 * 4 + 1) {
            let date = start_date + Duration::days(offset);
            if !self.matches_date(date) {
                continue;
            }
            for &hour in &self.hours {
                if offset == 0 && hour < local.hour() {
                    continue;
                }
                for &minute in &self.minutes {
                    let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
                        continue;
                    };
                    if naive <= local {
                        continue;
                    }
                    // Skips wall-clock times that do not exist (DST gaps).
                    if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

/// Parse a cron field into a sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for part in field.split(',') {
        values.extend(parse_part(part.trim(), min, max)?);
    }
    values.sort_unstable();
    values.dedup();
    if values.is_empty() { None } else { Some(values) }
}

fn parse_part(part: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let n: u32 = step.parse().ok()?;
            if n == 0 {
                return None;
            }
            (range, n)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((a, b)) = range.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let n: u32 = range.parse().ok()?;
        // "N/step" runs from N to the end of the range.
        if step > 1 { (n, max) } else { (n, n) }
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }
    Some((lo..=hi).step_by(step as usize).collect())
}
