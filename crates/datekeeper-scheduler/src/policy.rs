//! Interval policy — which enabled lead intervals are currently due.
//!
//! An interval `k` is due while `0 <= days_left <= k`. Using `<=` instead of
//! `== k` tolerates skipped scheduler days; the ledger, not this function,
//! stops repeats. Expired documents are never due.

use chrono::NaiveDate;
use datekeeper_core::ReminderInterval;

use crate::status::days_left;

/// Due subset of `enabled`, longest lead first. Ignores ledger state.
pub fn due_intervals<'a, I>(expiry_date: NaiveDate, today: NaiveDate, enabled: I) -> Vec<ReminderInterval>
where
    I: IntoIterator<Item = &'a ReminderInterval>,
{
    let left = days_left(expiry_date, today);
    if left < 0 {
        return Vec::new();
    }
    let mut due: Vec<ReminderInterval> = enabled
        .into_iter()
        .copied()
        .filter(|interval| left <= interval.days())
        .collect();
    due.sort();
    due.dedup();
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 22).unwrap()
    }

    fn defaults() -> BTreeSet<ReminderInterval> {
        ReminderInterval::DEFAULTS.into_iter().collect()
    }

    fn due_at(days: i64, enabled: &BTreeSet<ReminderInterval>) -> Vec<ReminderInterval> {
        due_intervals(today() + Duration::days(days), today(), enabled)
    }

    #[test]
    fn test_25_days_left() {
        assert_eq!(
            due_at(25, &defaults()),
            vec![
                ReminderInterval::SixMonths,
                ReminderInterval::ThreeMonths,
                ReminderInterval::OneMonth,
            ]
        );
    }

    #[test]
    fn test_expired_is_never_due() {
        let all: BTreeSet<ReminderInterval> = ReminderInterval::ALL.into_iter().collect();
        assert!(due_at(-3, &all).is_empty());
        assert!(due_at(-1, &all).is_empty());
    }

    #[test]
    fn test_iff_condition_over_range() {
        let all: BTreeSet<ReminderInterval> = ReminderInterval::ALL.into_iter().collect();
        for d in -10..=200 {
            let due = due_at(d, &all);
            for interval in ReminderInterval::ALL {
                let expected = 0 <= d && d <= interval.days();
                assert_eq!(due.contains(&interval), expected, "day {d}, interval {interval}");
            }
        }
    }

    #[test]
    fn test_disabled_intervals_never_due() {
        let only_week: BTreeSet<ReminderInterval> = [ReminderInterval::SevenDays].into_iter().collect();
        assert!(due_at(25, &only_week).is_empty());
        assert_eq!(due_at(3, &only_week), vec![ReminderInterval::SevenDays]);
        assert!(due_at(3, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_on_expiry_only_on_the_day() {
        let final_notice: BTreeSet<ReminderInterval> = [ReminderInterval::OnExpiry].into_iter().collect();
        assert_eq!(due_at(0, &final_notice), vec![ReminderInterval::OnExpiry]);
        assert!(due_at(1, &final_notice).is_empty());
        assert!(due_at(-1, &final_notice).is_empty());
    }

    #[test]
    fn test_window_edges() {
        assert!(due_at(181, &defaults()).is_empty());
        assert_eq!(due_at(180, &defaults()), vec![ReminderInterval::SixMonths]);
        assert_eq!(due_at(0, &defaults()).len(), 4);
    }
}
