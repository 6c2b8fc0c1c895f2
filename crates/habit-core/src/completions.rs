use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dates::parse_date;

/// Per-day completion flags of a single habit.
pub type CompletionRecord = BTreeMap<NaiveDate, bool>;

/// Habit id → day → completed. Serialized as
/// `{"<habit id>": {"YYYY-MM-DD": true, ...}, ...}`.
///
/// A missing habit or a missing day reads as "not completed". Transitions take
/// the store by value and hand back the next one, so a caller holding an older
/// snapshot never observes a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompletionStore {
    records: BTreeMap<String, CompletionRecord>,
}

impl CompletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, habit_id: &str, date: NaiveDate) -> bool {
        self.records
            .get(habit_id)
            .and_then(|record| record.get(&date))
            .copied()
            .unwrap_or(false)
    }

    /// Whether the habit has ever had a flag written, including `false` ones.
    pub fn has_record(&self, habit_id: &str) -> bool {
        self.records.contains_key(habit_id)
    }

    pub fn habit_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flips the flag for `date`. The previous value is not kept.
    #[must_use]
    pub fn toggle(mut self, habit_id: &str, date: NaiveDate) -> Self {
        let record = self.records.entry(habit_id.to_string()).or_default();
        let flag = record.entry(date).or_insert(false);
        *flag = !*flag;
        self
    }

    #[must_use]
    pub fn set(mut self, habit_id: &str, date: NaiveDate, done: bool) -> Self {
        self.records
            .entry(habit_id.to_string())
            .or_default()
            .insert(date, done);
        self
    }

    /// Drops every flag of the habit.
    #[must_use]
    pub fn remove_habit(mut self, habit_id: &str) -> Self {
        self.records.remove(habit_id);
        self
    }
}

/// Day keys must be the zero-padded `YYYY-MM-DD` form.
impl<'de> Deserialize<'de> for CompletionStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, BTreeMap<String, bool>>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(habit_id, days)| {
                days.into_iter()
                    .map(|(key, done)| parse_date(&key).map(|date| (date, done)))
                    .collect::<Result<CompletionRecord, _>>()
                    .map(|record| (habit_id, record))
                    .map_err(<D::Error as serde::de::Error>::custom)
            })
            .collect()
    }
}

impl FromIterator<(String, CompletionRecord)> for CompletionStore {
    fn from_iter<T: IntoIterator<Item = (String, CompletionRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
