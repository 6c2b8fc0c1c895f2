use chrono::NaiveDate;

use crate::completions::CompletionStore;
use crate::dates::trailing_days;
use crate::error::HabitError;

pub const DEFAULT_RATE_WINDOW: u32 = 30;

/// `numerator / denominator` rounded to the nearest integer, halves up.
/// Zero when `denominator` is zero.
pub fn round_half_up(numerator: usize, denominator: usize) -> usize {
    if denominator == 0 {
        return 0;
    }
    (2 * numerator + denominator) / (2 * denominator)
}

/// `part / whole` as a whole percentage, rounded half up.
pub fn percentage(part: usize, whole: usize) -> u8 {
    round_half_up(part * 100, whole).min(100) as u8
}

/// Share of the `window_days` days ending today (inclusive) that are completed,
/// as 0-100. A habit without a record, or a zero window, rates 0.
pub fn completion_rate(
    store: &CompletionStore,
    habit_id: &str,
    window_days: u32,
    today: NaiveDate,
) -> u8 {
    if window_days == 0 || !store.has_record(habit_id) {
        return 0;
    }

    let completed = trailing_days(today, window_days)
        .filter(|day| store.is_completed(habit_id, *day))
        .count();
    percentage(completed, window_days as usize)
}

/// Same as [`completion_rate`] but refuses a zero window.
pub fn try_completion_rate(
    store: &CompletionStore,
    habit_id: &str,
    window_days: u32,
    today: NaiveDate,
) -> Result<u8, HabitError> {
    if window_days == 0 {
        return Err(HabitError::InvalidArgument(
            "completion rate window must be at least one day".to_string(),
        ));
    }
    Ok(completion_rate(store, habit_id, window_days, today))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
    }

    #[test]
    fn three_of_seven_rounds_to_43() {
        let store = [0, 2, 6]
            .into_iter()
            .fold(CompletionStore::new(), |store, offset| {
                store.set("h", today() - Duration::days(offset), true)
            })
            // Outside the window.
            .set("h", today() - Duration::days(7), true);
        assert_eq!(completion_rate(&store, "h", 7, today()), 43);
    }

    #[test]
    fn no_record_rates_zero() {
        assert_eq!(completion_rate(&CompletionStore::new(), "h", 30, today()), 0);
    }

    #[test]
    fn zero_window_falls_back_to_zero() {
        let store = CompletionStore::new().set("h", today(), true);
        assert_eq!(completion_rate(&store, "h", 0, today()), 0);
        assert!(matches!(
            try_completion_rate(&store, "h", 0, today()),
            Err(HabitError::InvalidArgument(_))
        ));
        assert_eq!(try_completion_rate(&store, "h", 1, today()), Ok(100));
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(round_half_up(5, 2), 3);
    }
}
