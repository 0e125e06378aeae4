//! Decides whether a recurring task has gone stale since its last check.

use chrono::{NaiveDateTime, Timelike};

use crate::recurrence::Recurrence;

/// True when a task last checked at `last_checked` should read as unchecked
/// again at `now`.
///
/// A task may reset up to 10% of its period early: staleness starts once a
/// whole period of days has elapsed, or once the elapsed hours reach the
/// period's hours minus `floor(period_days * 0.1)`. With an `at` time the
/// task also resets on the boundary day once the clock passes that hour.
pub fn should_recur(rule: &Recurrence, last_checked: NaiveDateTime, now: NaiveDateTime) -> bool {
    let period_days = rule.recurs.period_days();
    let elapsed = now - last_checked;
    let elapsed_days = elapsed.num_days();
    let elapsed_hours = elapsed.num_seconds() as f64 / 3600.0;
    let threshold_hours = (period_days * 24 - period_days / 10) as f64;

    let day_check = elapsed_days >= period_days || elapsed_hours >= threshold_hours;

    match rule.at {
        Some(at) => day_check || (elapsed_days == period_days && now.hour() >= at.hour()),
        None => day_check,
    }
}

/// Checked state used for display.
///
/// One-time tasks, and recurring tasks with no check history, report the
/// stored flag. Otherwise the stored flag holds only until the rule says the
/// last check has gone stale.
pub fn effective_checked(
    checked: bool,
    rule: Option<&Recurrence>,
    checked_at: &[NaiveDateTime],
    now: NaiveDateTime,
) -> bool {
    match (rule, checked_at.last()) {
        (Some(rule), Some(&last)) => checked && !should_recur(rule, last, now),
        _ => checked,
    }
}
