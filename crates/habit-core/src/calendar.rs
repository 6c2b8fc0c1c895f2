//! Month grids for the per-habit calendar view.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::completions::CompletionStore;
use crate::dates::{dates_in_range, month_name, week_end, week_start};
use crate::error::HabitError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub day_number: u32,
    pub is_current_month: bool,
    pub is_today: bool,
}

/// Whole weeks from the Sunday on or before the 1st of `month0` (zero-based) to
/// the Saturday on or after its last day. Cells of neighbouring months are
/// included with `is_current_month == false`.
pub fn calendar_grid(
    year: i32,
    month0: u32,
    today: NaiveDate,
) -> Result<Vec<CalendarCell>, HabitError> {
    let (first, last) = month_bounds(year, month0)?;

    Ok(dates_in_range(week_start(first), week_end(last))
        .into_iter()
        .map(|date| CalendarCell {
            date,
            day_number: date.day(),
            is_current_month: date.month0() == month0 && date.year() == year,
            is_today: date == today,
        })
        .collect())
}

fn month_bounds(year: i32, month0: u32) -> Result<(NaiveDate, NaiveDate), HabitError> {
    if month0 > 11 {
        return Err(HabitError::OutOfRange {
            index: i64::from(month0),
        });
    }
    let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .ok_or_else(|| HabitError::InvalidArgument(format!("year {year} is not supported")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| HabitError::InvalidArgument(format!("year {year} is not supported")))?;
    Ok((first, last))
}

/// 1 when the habit was done that day, 0 otherwise. Kept numeric so the view
/// can grow intensity levels later.
pub fn completion_level(store: &CompletionStore, habit_id: &str, date: NaiveDate) -> u8 {
    u8::from(store.is_completed(habit_id, date))
}

/// The month shown by a calendar view, with wrap-around navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCursor {
    pub year: i32,
    /// Zero-based, 0 = January.
    pub month0: u32,
}

impl MonthCursor {
    pub fn new(year: i32, month0: u32) -> Result<Self, HabitError> {
        month_bounds(year, month0)?;
        Ok(Self { year, month0 })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month0: date.month0(),
        }
    }

    /// Parses `YYYY-MM` (one-based month, as users write it).
    pub fn parse(raw: &str) -> Result<Self, HabitError> {
        let invalid = || HabitError::InvalidArgument(format!("expected YYYY-MM, got '{raw}'"));
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if month == 0 {
            return Err(invalid());
        }
        Self::new(year, month - 1)
    }

    #[must_use]
    pub fn prev(self) -> Self {
        if self.month0 == 0 {
            Self {
                year: self.year - 1,
                month0: 11,
            }
        } else {
            Self {
                month0: self.month0 - 1,
                ..self
            }
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        if self.month0 == 11 {
            Self {
                year: self.year + 1,
                month0: 0,
            }
        } else {
            Self {
                month0: self.month0 + 1,
                ..self
            }
        }
    }

    pub fn title(&self) -> Result<String, HabitError> {
        Ok(format!("{} {}", month_name(self.month0)?, self.year))
    }

    pub fn grid(&self, today: NaiveDate) -> Result<Vec<CalendarCell>, HabitError> {
        calendar_grid(self.year, self.month0, today)
    }
}
