//! Backup files: the JSON document written by `export` and accepted by `import`.
//!
//! Import is all-or-nothing. The document is checked for every required key,
//! decoded into typed values and validated habit by habit before anything is
//! handed back, so a rejected file never reaches the state store.

use std::collections::HashSet;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::completions::CompletionStore;
use crate::error::HabitError;
use crate::habit::Habit;
use crate::state::TrackerState;

pub const BACKUP_VERSION: &str = "1.0";

const REQUIRED_KEYS: [&str; 4] = ["habits", "completions", "exportDate", "version"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub habits: Vec<Habit>,
    pub completions: CompletionStore,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

impl Backup {
    pub fn new(state: &TrackerState, now: DateTime<Utc>) -> Self {
        Self {
            habits: state.habits.clone(),
            completions: state.completions.clone(),
            export_date: now,
            version: BACKUP_VERSION.to_string(),
        }
    }
}

/// Serializes `state` as a pretty-printed (2-space) backup document.
#[tracing::instrument(skip(state, now), fields(habits = state.habits.len()))]
pub fn export_backup(state: &TrackerState, now: DateTime<Utc>) -> anyhow::Result<String> {
    let backup = Backup::new(state, now);
    let mut out = serde_json::to_string_pretty(&backup).context("failed to serialize backup")?;
    out.push('\n');
    debug!(bytes = out.len(), "exported backup");
    Ok(out)
}

pub fn backup_file_name(today: NaiveDate) -> String {
    format!("habit-tracker-backup-{}.json", today.format("%Y-%m-%d"))
}

/// Decodes a backup document into the state it describes.
#[tracing::instrument(skip(raw), fields(bytes = raw.len()))]
pub fn import_backup(raw: &str) -> Result<TrackerState, HabitError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| HabitError::ImportRejected(format!("not valid JSON: {err}")))?;

    let Some(object) = value.as_object() else {
        return Err(HabitError::ImportRejected(
            "expected a JSON object at the top level".to_string(),
        ));
    };
    if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !object.contains_key(**key)) {
        return Err(HabitError::ImportRejected(format!(
            "missing required key '{missing}'"
        )));
    }

    let backup: Backup = serde_json::from_value(value)
        .map_err(|err| HabitError::ImportRejected(format!("malformed backup: {err}")))?;

    if backup.version != BACKUP_VERSION {
        return Err(HabitError::ImportRejected(format!(
            "unsupported backup version '{}'",
            backup.version
        )));
    }

    let mut seen = HashSet::new();
    for habit in &backup.habits {
        habit
            .validate()
            .map_err(|err| HabitError::ImportRejected(err.to_string()))?;
        if !seen.insert(habit.id.as_str()) {
            return Err(HabitError::ImportRejected(format!(
                "habit id '{}' appears more than once",
                habit.id
            )));
        }
    }

    let orphans = backup
        .completions
        .habit_ids()
        .filter(|id| !seen.contains(*id))
        .count();
    if orphans > 0 {
        warn!(orphans, "backup holds completions for habits it does not list");
    }

    debug!(
        habits = backup.habits.len(),
        export_date = %backup.export_date,
        "backup accepted"
    );
    Ok(TrackerState {
        habits: backup.habits,
        completions: backup.completions,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 0)
            .single()
            .expect("valid now")
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
    }

    fn sample_state() -> TrackerState {
        let habit = Habit {
            id: "1700000000000".to_string(),
            name: "Read".to_string(),
            icon: "📚".to_string(),
            created_at: now(),
            scheduled_at: None,
        };
        TrackerState {
            habits: vec![habit],
            completions: CompletionStore::new()
                .set("1700000000000", day(16), true)
                .set("1700000000000", day(17), false),
        }
    }

    #[test]
    fn export_then_import_reproduces_state() {
        let state = sample_state();
        let raw = export_backup(&state, now()).expect("export");
        assert_eq!(import_backup(&raw).expect("import"), state);
    }

    #[test]
    fn export_uses_two_space_indent_and_camel_case() {
        let raw = export_backup(&sample_state(), now()).expect("export");
        assert!(raw.starts_with("{\n  \"habits\": ["));
        assert!(raw.contains("\"exportDate\": \"2026-10-17T08:30:00Z\""));
        assert!(raw.contains("\"version\": \"1.0\""));
        assert!(raw.contains("\"createdAt\""));
    }

    #[test]
    fn file_name_carries_the_day() {
        assert_eq!(
            backup_file_name(day(17)),
            "habit-tracker-backup-2026-10-17.json"
        );
    }

    #[test]
    fn rejects_missing_keys() {
        let err = import_backup(r#"{"habits": [], "exportDate": "2026-10-17T00:00:00Z", "version": "1.0"}"#)
            .expect_err("missing completions");
        assert_eq!(
            err,
            HabitError::ImportRejected("missing required key 'completions'".to_string())
        );
        assert!(import_backup("[]").is_err());
        assert!(import_backup("not json").is_err());
    }

    #[test]
    fn rejects_mistyped_fields() {
        let bad_habits = r#"{"habits": {}, "completions": {}, "exportDate": "2026-10-17T00:00:00Z", "version": "1.0"}"#;
        assert!(matches!(
            import_backup(bad_habits),
            Err(HabitError::ImportRejected(_))
        ));

        let bad_date = r#"{"habits": [], "completions": {"h": {"2026-13-01": true}}, "exportDate": "2026-10-17T00:00:00Z", "version": "1.0"}"#;
        assert!(import_backup(bad_date).is_err());

        let unpadded = r#"{"habits": [], "completions": {"h": {"2026-03-05": false, "2026-3-5": true}}, "exportDate": "2026-10-17T00:00:00Z", "version": "1.0"}"#;
        assert!(matches!(
            import_backup(unpadded),
            Err(HabitError::ImportRejected(_))
        ));

        let bad_flag = r#"{"habits": [], "completions": {"h": {"2026-10-01": "yes"}}, "exportDate": "2026-10-17T00:00:00Z", "version": "1.0"}"#;
        assert!(import_backup(bad_flag).is_err());
    }

    #[test]
    fn rejects_invalid_and_duplicate_habits() {
        let mut state = sample_state();
        state.habits.push(state.habits[0].clone());
        let raw = export_backup(&state, now()).expect("export");
        assert!(matches!(
            import_backup(&raw),
            Err(HabitError::ImportRejected(_))
        ));

        let mut state = sample_state();
        state.habits[0].name = "  ".to_string();
        let raw = export_backup(&state, now()).expect("export");
        assert!(import_backup(&raw).is_err());
    }

    #[test]
    fn imports_browser_app_backup() {
        let raw = r#"{
  "habits": [
    {
      "id": "1729160000000",
      "name": "Morning run",
      "icon": "🏃",
      "scheduledAt": "2026-10-17T09:00",
      "createdAt": "2026-10-17T08:30:00.000Z"
    },
    {
      "id": "1729160004321",
      "name": "Read",
      "icon": "📚",
      "scheduledAt": null,
      "createdAt": "2026-10-17T08:30:04.321Z"
    }
  ],
  "completions": {
    "1729160000000": { "2026-10-16": true, "2026-10-17": false }
  },
  "exportDate": "2026-10-17T21:15:42.117Z",
  "version": "1.0"
}"#;

        let state = import_backup(raw).expect("browser backup imports");

        assert_eq!(state.habits.len(), 2);
        let run = &state.habits[0];
        assert_eq!(
            run.scheduled_at.map(|at| at.display(&crate::datetime::DayBoundary::Utc)),
            Some("2026-10-17 09:00".to_string())
        );
        assert_eq!(
            run.created_at,
            Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 0)
                .single()
                .expect("valid instant")
        );
        assert!(state.completions.is_completed("1729160000000", day(16)));
        assert!(!state.completions.is_completed("1729160000000", day(17)));

        let again = export_backup(&state, now()).expect("export");
        assert!(again.contains("\"scheduledAt\": \"2026-10-17T09:00\""));
        assert_eq!(import_backup(&again).expect("reimport"), state);
    }

    #[test]
    fn rejects_unknown_version() {
        let raw = r#"{"habits": [], "completions": {}, "exportDate": "2026-10-17T00:00:00Z", "version": "2.0"}"#;
        assert!(import_backup(raw).is_err());
    }
}
