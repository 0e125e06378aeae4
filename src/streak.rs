use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::recurrence::Recurrence;

/// Every calendar day from `start` to `end` inclusive. Empty when `end` is
/// before `start`.
pub fn days_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Number of consecutive days, ending on `now`'s date, that carry at least one
/// check. `None` for tasks without a rule.
///
/// Days are walked from `created`'s date to `now`'s date, so a task created in
/// the future has a streak of zero.
pub fn streak(
    rule: Option<&Recurrence>,
    created: NaiveDateTime,
    checked_at: &[NaiveDateTime],
    now: NaiveDateTime,
) -> Option<u32> {
    if rule.is_none() {
        return None;
    }
    let hit: HashSet<NaiveDate> = checked_at.iter().map(NaiveDateTime::date).collect();
    let days: Vec<NaiveDate> = days_range(created.date(), now.date()).collect();
    let run = days
        .iter()
        .rev()
        .take_while(|day| hit.contains(*day))
        .count();
    Some(run as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::parse;
    use chrono::Duration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn range_is_inclusive() {
        let days: Vec<_> = days_range(day(2024, 2, 27), day(2024, 3, 1)).collect();
        assert_eq!(
            days,
            vec![day(2024, 2, 27), day(2024, 2, 28), day(2024, 2, 29), day(2024, 3, 1)]
        );
        assert_eq!(days_range(day(2024, 1, 1), day(2024, 1, 1)).count(), 1);
        assert_eq!(days_range(day(2024, 1, 2), day(2024, 1, 1)).count(), 0);
    }

    #[test]
    fn one_time_task_has_no_streak() {
        let now = noon(day(2024, 1, 10));
        assert_eq!(streak(None, now, &[now], now), None);
    }

    #[test]
    fn checked_every_day_counts_age_plus_one() {
        let rule = parse("daily").unwrap();
        let created = day(2024, 1, 1).and_hms_opt(23, 0, 0).unwrap();
        let now = noon(day(2024, 1, 10));
        let checks: Vec<_> = days_range(created.date(), now.date()).map(noon).collect();
        assert_eq!(streak(Some(&rule), created, &checks, now), Some(10));
    }

    #[test]
    fn one_missed_day_truncates() {
        let rule = parse("daily").unwrap();
        let created = noon(day(2024, 1, 1));
        let now = noon(day(2024, 1, 10));
        for k in 1..=9 {
            let missed = now.date() - Duration::days(k);
            let checks: Vec<_> = days_range(created.date(), now.date())
                .filter(|d| *d != missed)
                .map(noon)
                .collect();
            assert_eq!(streak(Some(&rule), created, &checks, now), Some(k as u32));
        }
    }

    #[test]
    fn unchecked_today_is_zero() {
        let rule = parse("daily").unwrap();
        let created = noon(day(2024, 1, 1));
        let now = noon(day(2024, 1, 3));
        let checks = [noon(day(2024, 1, 1)), noon(day(2024, 1, 2))];
        assert_eq!(streak(Some(&rule), created, &checks, now), Some(0));
    }

    #[test]
    fn several_checks_on_one_day_count_once() {
        let rule = parse("daily").unwrap();
        let created = noon(day(2024, 1, 1));
        let now = noon(day(2024, 1, 2));
        let checks = [
            day(2024, 1, 2).and_hms_opt(1, 0, 0).unwrap(),
            day(2024, 1, 2).and_hms_opt(9, 0, 0).unwrap(),
        ];
        assert_eq!(streak(Some(&rule), created, &checks, now), Some(1));
    }

    #[test]
    fn created_after_now_is_zero() {
        let rule = parse("weekly").unwrap();
        let now = noon(day(2024, 1, 1));
        let created = noon(day(2024, 2, 1));
        assert_eq!(streak(Some(&rule), created, &[now], now), Some(0));
    }
}
