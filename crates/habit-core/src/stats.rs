//! Aggregates behind the progress charts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::completions::CompletionStore;
use crate::habit::Habit;
use crate::rate::{completion_rate, round_half_up};
use crate::trend::{TrendPoint, weekly_trend};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRates {
    pub habit_id: String,
    pub name: String,
    pub icon: String,
    pub rate_30_days: u8,
    pub rate_7_days: u8,
    pub rate_14_days: u8,
}

/// Bucket of a habit's 7-day completion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Average,
    NeedsWork,
}

impl PerformanceTier {
    pub const ALL: [PerformanceTier; 4] = [
        PerformanceTier::Excellent,
        PerformanceTier::Good,
        PerformanceTier::Average,
        PerformanceTier::NeedsWork,
    ];

    pub fn from_rate(rate: u8) -> Self {
        match rate {
            80.. => PerformanceTier::Excellent,
            60..=79 => PerformanceTier::Good,
            40..=59 => PerformanceTier::Average,
            _ => PerformanceTier::NeedsWork,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "Excellent (80%+)",
            PerformanceTier::Good => "Good (60-79%)",
            PerformanceTier::Average => "Average (40-59%)",
            PerformanceTier::NeedsWork => "Needs Work (<40%)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierCount {
    pub tier: PerformanceTier,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub rates: Vec<HabitRates>,
    /// Only tiers with at least one habit, best tier first.
    pub tiers: Vec<TierCount>,
    pub trend: Vec<TrendPoint>,
    pub active_habits: usize,
    pub seven_day_average: u8,
    pub week_total: usize,
}

pub fn habit_rates(habit: &Habit, store: &CompletionStore, today: NaiveDate) -> HabitRates {
    HabitRates {
        habit_id: habit.id.clone(),
        name: habit.name.clone(),
        icon: habit.icon.clone(),
        rate_30_days: completion_rate(store, &habit.id, 30, today),
        rate_7_days: completion_rate(store, &habit.id, 7, today),
        rate_14_days: completion_rate(store, &habit.id, 14, today),
    }
}

pub fn tier_counts(rates: &[HabitRates]) -> Vec<TierCount> {
    PerformanceTier::ALL
        .into_iter()
        .map(|tier| TierCount {
            tier,
            count: rates
                .iter()
                .filter(|rate| PerformanceTier::from_rate(rate.rate_7_days) == tier)
                .count(),
        })
        .filter(|entry| entry.count > 0)
        .collect()
}

#[tracing::instrument(skip(habits, store), fields(habits = habits.len()))]
pub fn summarize(habits: &[Habit], store: &CompletionStore, today: NaiveDate) -> ProgressSummary {
    let rates: Vec<HabitRates> = habits
        .iter()
        .map(|habit| habit_rates(habit, store, today))
        .collect();
    let trend = weekly_trend(habits, store, today);

    let seven_day_sum: usize = rates.iter().map(|rate| usize::from(rate.rate_7_days)).sum();
    let seven_day_average = round_half_up(seven_day_sum, rates.len()) as u8;
    let week_total = trend.iter().map(|point| point.completed).sum();

    ProgressSummary {
        tiers: tier_counts(&rates),
        rates,
        trend,
        active_habits: habits.len(),
        seven_day_average,
        week_total,
    }
}
