//! Time windows for event queries.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::error::{CourseCalError, CourseCalResult};

/// Half-open query window `[from, to)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// `[now, now + days]`: the events participants still care about.
    pub fn upcoming(now: DateTime<Utc>, days: i64) -> CourseCalResult<Self> {
        Ok(DateRange {
            from: now,
            to: shift(now, days)?,
        })
    }

    /// `[now - max_days, now - min_days]`: events old enough to leave history.
    pub fn past(now: DateTime<Utc>, min_days: i64, max_days: i64) -> CourseCalResult<Self> {
        Ok(DateRange {
            from: shift(now, max_days.saturating_neg())?,
            to: shift(now, min_days.saturating_neg())?,
        })
    }

    pub fn from_rfc3339(&self) -> String {
        self.from.to_rfc3339()
    }

    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339()
    }
}

fn shift(now: DateTime<Utc>, days: i64) -> CourseCalResult<DateTime<Utc>> {
    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| CourseCalError::Config(format!("{} days from {} is out of range", days, now)))
}

/// Inclusive range of calendar days, used to narrow a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DayRange {
    /// Parse ISO dates (`YYYY-MM-DD`) or datetimes; only the date part is kept.
    pub fn from_args(first: &str, last: &str) -> Result<Self, String> {
        Ok(DayRange {
            first: parse_day(first)?,
            last: parse_day(last)?,
        })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    Err(format!("Invalid date '{}'. Expected YYYY-MM-DD", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn past_window_ends_before_now() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let range = DateRange::past(now, 7, 60).unwrap();

        assert_eq!(range.to, Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap());
        assert_eq!(range.from, Utc.with_ymd_and_hms(2025, 1, 9, 12, 0, 0).unwrap());
    }

    #[test]
    fn huge_windows_are_config_errors() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();

        let err = DateRange::upcoming(now, 9_223_372_036_854_775).unwrap_err();
        assert!(matches!(err, CourseCalError::Config(_)));
        assert!(matches!(DateRange::past(now, 7, i64::MAX), Err(CourseCalError::Config(_))));
        assert!(matches!(DateRange::upcoming(now, 100_000_000), Err(CourseCalError::Config(_))));
    }

    #[test]
    fn day_range_accepts_dates_and_datetimes() {
        let range = DayRange::from_args("2025-03-01", "2025-03-14T23:00:00+01:00").unwrap();

        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()));
    }

    #[test]
    fn day_range_rejects_garbage() {
        assert!(DayRange::from_args("next week", "2025-03-14").is_err());
    }
}
