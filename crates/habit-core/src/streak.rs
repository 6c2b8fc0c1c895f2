use chrono::{Duration, NaiveDate};

use crate::completions::CompletionStore;

/// How far back the streak walk looks. Runs longer than this undercount.
pub const STREAK_LOOKBACK_DAYS: i64 = 365;

/// Consecutive completed days ending today, or ending yesterday when today is
/// not done yet.
///
/// Walks offsets 0, -1, ..., -365. A missing day before today ends the walk; a
/// missing today contributes nothing and the walk carries on with yesterday.
pub fn streak(store: &CompletionStore, habit_id: &str, today: NaiveDate) -> u32 {
    if !store.has_record(habit_id) {
        return 0;
    }

    let mut count = 0;
    for offset in 0..=STREAK_LOOKBACK_DAYS {
        let day = today - Duration::days(offset);
        if store.is_completed(habit_id, day) {
            count += 1;
        } else if offset > 0 {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
    }

    fn completed_days_ago(offsets: &[i64]) -> CompletionStore {
        offsets.iter().fold(CompletionStore::new(), |store, offset| {
            store.set("h", today() - Duration::days(*offset), true)
        })
    }

    #[test]
    fn no_record_is_zero() {
        assert_eq!(streak(&CompletionStore::new(), "h", today()), 0);
    }

    #[test]
    fn today_and_four_prior_days() {
        let store = completed_days_ago(&[0, 1, 2, 3, 4, 6]);
        assert_eq!(streak(&store, "h", today()), 5);
    }

    #[test]
    fn yesterday_only_counts_one() {
        let store = completed_days_ago(&[1]);
        assert_eq!(streak(&store, "h", today()), 1);
    }

    #[test]
    fn today_only_counts_one() {
        let store = completed_days_ago(&[0, 2, 3]);
        assert_eq!(streak(&store, "h", today()), 1);
    }

    #[test]
    fn gap_before_yesterday_breaks() {
        let store = completed_days_ago(&[2, 3, 4]);
        assert_eq!(streak(&store, "h", today()), 0);
    }

    #[test]
    fn explicit_false_today_is_skipped() {
        let store = completed_days_ago(&[1, 2]).set("h", today(), false);
        assert_eq!(streak(&store, "h", today()), 2);
    }

    #[test]
    fn capped_by_lookback() {
        let offsets: Vec<i64> = (0..500).collect();
        let store = completed_days_ago(&offsets);
        assert_eq!(
            streak(&store, "h", today()),
            (STREAK_LOOKBACK_DAYS + 1) as u32
        );
    }
}
