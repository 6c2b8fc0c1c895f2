//! Calendar-day helpers shared by every calculator.
//!
//! A day is always a [`NaiveDate`] produced by [`crate::datetime::DayBoundary`];
//! its `YYYY-MM-DD` rendering from [`format_date`] is the key used in the
//! completion store and in exported files.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::clock::Clock;
use crate::datetime::DayBoundary;
use crate::error::HabitError;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Sunday-first, matching the week layout of the calendar grid.
pub const WEEKDAY_ABBREVIATIONS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekDayEntry {
    pub date: NaiveDate,
    pub day_name: &'static str,
    pub day_number: u32,
    pub is_today: bool,
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` day key. Only the zero-padded form is accepted, so
/// every day has exactly one key.
pub fn parse_date(raw: &str) -> Result<NaiveDate, HabitError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .filter(|date| format_date(*date) == raw)
        .ok_or_else(|| HabitError::InvalidArgument(format!("'{raw}' is not a YYYY-MM-DD day")))
}

pub fn today_string(clock: &dyn Clock, boundary: &DayBoundary) -> String {
    format_date(clock.today(boundary))
}

/// Every day from `start` to `end`, both inclusive. Empty when `start > end`.
#[must_use]
pub fn dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// The Sunday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// The Saturday on or after `date`.
#[must_use]
pub fn week_end(date: NaiveDate) -> NaiveDate {
    date + Duration::days(i64::from(6 - date.weekday().num_days_from_sunday()))
}

#[must_use]
pub fn weekday_abbreviation(date: NaiveDate) -> &'static str {
    WEEKDAY_ABBREVIATIONS[date.weekday().num_days_from_sunday() as usize]
}

/// Sunday through Saturday of the week containing `today`.
#[must_use]
pub fn current_week_dates(today: NaiveDate) -> Vec<WeekDayEntry> {
    dates_in_range(week_start(today), week_end(today))
        .into_iter()
        .map(|date| WeekDayEntry {
            date,
            day_name: weekday_abbreviation(date),
            day_number: date.day(),
            is_today: date == today,
        })
        .collect()
}

/// Full English name of a zero-based month index.
pub fn month_name(month_index: u32) -> Result<&'static str, HabitError> {
    MONTH_NAMES
        .get(month_index as usize)
        .copied()
        .ok_or(HabitError::OutOfRange {
            index: i64::from(month_index),
        })
}

/// The `days` calendar days ending at `today`, newest first.
pub(crate) fn trailing_days(today: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..i64::from(days)).map(move |offset| today - Duration::days(offset))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc, Weekday};

    use super::*;
    use crate::clock::FixedClock;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn format_date_zero_pads() {
        assert_eq!(format_date(day(2026, 3, 7)), "2026-03-07");
    }

    #[test]
    fn parse_date_wants_the_padded_form() {
        assert_eq!(parse_date("2026-03-05"), Ok(day(2026, 3, 5)));
        assert!(parse_date("2026-3-5").is_err());
        assert!(parse_date("2026-03-5").is_err());
        assert!(parse_date("2026-02-30").is_err());
        assert!(parse_date(" 2026-03-05").is_err());
    }

    #[test]
    fn today_string_follows_the_day_boundary() {
        let clock = FixedClock(
            Utc.with_ymd_and_hms(2026, 3, 10, 2, 30, 0)
                .single()
                .expect("valid instant"),
        );
        assert_eq!(today_string(&clock, &DayBoundary::Utc), "2026-03-10");
        assert_eq!(
            today_string(&clock, &DayBoundary::Zone(chrono_tz::America::New_York)),
            "2026-03-09"
        );
    }

    #[test]
    fn single_day_range_is_that_day() {
        let d = day(2026, 10, 17);
        let range = dates_in_range(d, d);
        assert_eq!(range, vec![d]);
        assert_eq!(format_date(range[0]), format_date(d));
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(dates_in_range(day(2026, 10, 18), day(2026, 10, 17)).is_empty());
    }

    #[test]
    fn range_crosses_month_and_leap_day() {
        let range = dates_in_range(day(2024, 2, 27), day(2024, 3, 2));
        let rendered: Vec<String> = range.into_iter().map(format_date).collect();
        assert_eq!(
            rendered,
            vec![
                "2024-02-27",
                "2024-02-28",
                "2024-02-29",
                "2024-03-01",
                "2024-03-02"
            ]
        );
    }

    #[test]
    fn current_week_is_sunday_first() {
        // 2026-10-17 is a Saturday.
        let today = day(2026, 10, 17);
        let week = current_week_dates(today);

        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, day(2026, 10, 11));
        assert_eq!(week[0].date.weekday(), Weekday::Sun);
        assert_eq!(week[0].day_name, "Sun");
        assert_eq!(week[6].date, today);
        assert!(week[6].is_today);
        assert_eq!(week.iter().filter(|entry| entry.is_today).count(), 1);
    }

    #[test]
    fn current_week_on_sunday_starts_today() {
        let today = day(2026, 10, 18);
        let week = current_week_dates(today);
        assert_eq!(week[0].date, today);
        assert!(week[0].is_today);
        assert_eq!(week[6].day_name, "Sat");
        assert_eq!(week[6].day_number, 24);
    }

    #[test]
    fn month_names_by_zero_based_index() {
        assert_eq!(month_name(0), Ok("January"));
        assert_eq!(month_name(11), Ok("December"));
        assert_eq!(month_name(12), Err(HabitError::OutOfRange { index: 12 }));
    }

    #[test]
    fn trailing_days_end_today() {
        let today = day(2026, 1, 2);
        let days: Vec<NaiveDate> = trailing_days(today, 3).collect();
        assert_eq!(days, vec![day(2026, 1, 2), day(2026, 1, 1), day(2025, 12, 31)]);
    }
}
