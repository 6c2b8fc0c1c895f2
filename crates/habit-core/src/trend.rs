use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::completions::CompletionStore;
use crate::habit::Habit;
use crate::rate::percentage;

pub const TREND_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Short chart label such as `Oct 17`.
    pub label: String,
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

/// The last seven days, oldest first and ending today, with how many of the
/// current habits were completed on each.
///
/// `total` is today's habit count for every day; habits created or deleted
/// during the week are not backdated.
pub fn weekly_trend(habits: &[Habit], store: &CompletionStore, today: NaiveDate) -> Vec<TrendPoint> {
    let total = habits.len();
    (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let completed = habits
                .iter()
                .filter(|habit| store.is_completed(&habit.id, date))
                .count();
            TrendPoint {
                date,
                label: date.format("%b %-d").to_string(),
                completed,
                total,
                percentage: percentage(completed, total),
            }
        })
        .collect()
}
