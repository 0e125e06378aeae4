//! Recurrence rules and their text grammar.
//!
//! ```text
//! daily [at HH:MM]
//! (weekly|monthly|annually) [on TOKEN] [at HH:MM]
//! ```
//!
//! Parsing is case-insensitive and tolerant of extra whitespace. The parsed
//! [`Recurrence`] is the canonical form; the text is only how it is stored.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};

/// Text accepted in place of a rule to mean "one-time task".
pub const ONCE: &str = "once";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurs {
    Daily,
    Weekly,
    Monthly,
    Annually,
}

impl Recurs {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "annually" => Some(Self::Annually),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Annually => "annually",
        }
    }

    /// Nominal length of one period. Months and years are flat 30/365 days.
    pub fn period_days(self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Annually => 365,
        }
    }
}

impl fmt::Display for Recurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often, and optionally on which day and at what time, a task resets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recurrence {
    pub recurs: Recurs,
    /// Weekday or day-of-month token, kept as written (lowercased).
    pub on: Option<String>,
    pub at: Option<NaiveTime>,
}

impl Recurrence {
    pub fn new(recurs: Recurs) -> Self {
        Self {
            recurs,
            on: None,
            at: None,
        }
    }
}

/// Parse recurrence text. Returns `None` for anything outside the grammar,
/// including a malformed `at` time.
pub fn parse(text: &str) -> Option<Recurrence> {
    let lowered = text.trim().to_lowercase();
    let mut words = lowered.split_whitespace();
    let recurs = Recurs::parse(words.next()?)?;
    let mut rule = Recurrence::new(recurs);

    let mut next = words.next();
    if next == Some("on") {
        if recurs == Recurs::Daily {
            return None;
        }
        rule.on = Some(words.next()?.to_string());
        next = words.next();
    }
    if next == Some("at") {
        rule.at = Some(parse_time(words.next()?)?);
        next = words.next();
    }
    match next {
        None => Some(rule),
        Some(_) => None,
    }
}

pub fn validate(text: &str) -> bool {
    parse(text).is_some()
}

/// True when `text` spells the one-time marker rather than a rule.
pub fn is_once(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(ONCE)
}

/// `H:MM` or `HH:MM`, 24-hour.
fn parse_time(s: &str) -> Option<NaiveTime> {
    let (hour, minute) = s.split_once(':')?;
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(hour) || hour.len() > 2 || !digits(minute) || minute.len() != 2 {
        return None;
    }
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.recurs.as_str())?;
        if let Some(on) = &self.on {
            write!(f, " on {on}")?;
        }
        if let Some(at) = self.at {
            write!(f, " at {:02}:{:02}", at.hour(), at.minute())?;
        }
        Ok(())
    }
}

impl FromStr for Recurrence {
    type Err = InvalidRecurrence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s).ok_or_else(|| InvalidRecurrence(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid recurrence '{0}': expected 'daily [at HH:MM]' or '(weekly|monthly|annually) [on DAY] [at HH:MM]'")]
pub struct InvalidRecurrence(pub String);

impl Serialize for Recurrence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
