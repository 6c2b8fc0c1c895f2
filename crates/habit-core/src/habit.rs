use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{DayBoundary, format_date_time};
use crate::error::HabitError;

pub const DEFAULT_ICON: &str = "⭐";

pub const AVAILABLE_ICONS: [&str; 20] = [
    "💪", "🏃", "📚", "🧘", "💧", "🍎", "😴", "🎯", "🏋️", "🚶", "✍️", "🎨", "🎵", "🌱", "☕", "📝",
    "💊", "🧽", "📱", "⭐",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_at: Option<ScheduledAt>,
}

/// When a habit is planned for. Files written by the browser app carry the
/// bare `datetime-local` form value (`2026-10-17T09:00`, no offset); the CLI
/// records instants. Both are kept exactly as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduledAt {
    Instant(DateTime<Utc>),
    WallClock(#[serde(with = "wall_clock")] NaiveDateTime),
}

impl ScheduledAt {
    /// `YYYY-MM-DD HH:MM`; instants are shown in `boundary`, wall-clock
    /// values as written.
    pub fn display(&self, boundary: &DayBoundary) -> String {
        match self {
            ScheduledAt::Instant(at) => format_date_time(*at, boundary),
            ScheduledAt::WallClock(naive) => naive.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

mod wall_clock {
    use chrono::{NaiveDateTime, Timelike};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    const MINUTES: &str = "%Y-%m-%dT%H:%M";
    const SECONDS: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let fmt = if value.second() == 0 && value.nanosecond() == 0 {
            MINUTES
        } else {
            SECONDS
        };
        serializer.collect_str(&value.format(fmt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        [MINUTES, SECONDS]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
            .ok_or_else(|| D::Error::custom(format!("expected YYYY-MM-DDTHH:MM, got '{raw}'")))
    }
}

/// Fields that may change on edit. `None` leaves the field as it is; the id and
/// creation time never change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub scheduled_at: Option<Option<ScheduledAt>>,
}

impl Habit {
    pub fn new(
        name: &str,
        icon: Option<&str>,
        scheduled_at: Option<ScheduledAt>,
        now: DateTime<Utc>,
    ) -> Result<Self, HabitError> {
        let habit = Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            icon: icon.map(str::trim).unwrap_or(DEFAULT_ICON).to_string(),
            created_at: now,
            scheduled_at,
        };
        habit.validate()?;
        Ok(habit)
    }

    pub fn validate(&self) -> Result<(), HabitError> {
        if self.id.trim().is_empty() {
            return Err(HabitError::InvalidHabit("id cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(HabitError::InvalidHabit(format!(
                "habit {} has an empty name",
                self.id
            )));
        }
        if self.icon.trim().is_empty() {
            return Err(HabitError::InvalidHabit(format!(
                "habit {} has an empty icon",
                self.id
            )));
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: &HabitPatch) -> Result<(), HabitError> {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(icon) = &patch.icon {
            next.icon = icon.trim().to_string();
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            next.scheduled_at = scheduled_at;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Resolves a habit by exact id, unique id prefix, or case-insensitive name.
pub fn find_habit<'a>(habits: &'a [Habit], selector: &str) -> Result<&'a Habit, HabitError> {
    let selector = selector.trim();
    if let Some(habit) = habits.iter().find(|habit| habit.id == selector) {
        return Ok(habit);
    }

    let by_name: Vec<&Habit> = habits
        .iter()
        .filter(|habit| habit.name.eq_ignore_ascii_case(selector))
        .collect();
    match by_name.as_slice() {
        [habit] => return Ok(*habit),
        [_, _, ..] => return Err(HabitError::AmbiguousHabit(selector.to_string())),
        [] => {}
    }

    if selector.is_empty() {
        return Err(HabitError::UnknownHabit(selector.to_string()));
    }
    let by_prefix: Vec<&Habit> = habits
        .iter()
        .filter(|habit| habit.id.starts_with(selector))
        .collect();
    match by_prefix.as_slice() {
        [habit] => Ok(*habit),
        [] => Err(HabitError::UnknownHabit(selector.to_string())),
        _ => Err(HabitError::AmbiguousHabit(selector.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0)
            .single()
            .expect("valid now")
    }

    fn fixture(id: &str, name: &str) -> Habit {
        Habit {
            id: id.to_string(),
            name: name.to_string(),
            icon: "📚".to_string(),
            created_at: now(),
            scheduled_at: None,
        }
    }

    #[test]
    fn new_trims_name_and_defaults_icon() {
        let habit = Habit::new("  Read  ", None, None, now()).expect("valid habit");
        assert_eq!(habit.name, "Read");
        assert_eq!(habit.icon, DEFAULT_ICON);
        assert_eq!(habit.created_at, now());
        assert!(!habit.id.is_empty());
    }

    #[test]
    fn new_rejects_blank_name() {
        assert!(matches!(
            Habit::new("   ", None, None, now()),
            Err(HabitError::InvalidHabit(_))
        ));
    }

    #[test]
    fn patch_keeps_id_and_rejects_blank_name() {
        let mut habit = fixture("1700000000000", "Read");
        habit
            .apply(&HabitPatch {
                name: Some(" Read more ".to_string()),
                icon: Some("📝".to_string()),
                scheduled_at: Some(Some(ScheduledAt::Instant(now()))),
            })
            .expect("valid patch");
        assert_eq!(habit.id, "1700000000000");
        assert_eq!(habit.name, "Read more");
        assert_eq!(habit.scheduled_at, Some(ScheduledAt::Instant(now())));

        let err = habit.apply(&HabitPatch {
            name: Some("  ".to_string()),
            ..HabitPatch::default()
        });
        assert!(err.is_err());
        assert_eq!(habit.name, "Read more");
    }

    #[test]
    fn serializes_camel_case_fields() {
        let habit = fixture("1", "Read");
        let value = serde_json::to_value(&habit).expect("serialize");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("scheduledAt").is_some_and(|v| v.is_null()));
    }

    #[test]
    fn scheduled_at_keeps_browser_and_cli_forms() {
        let wall: ScheduledAt =
            serde_json::from_str(r#""2026-10-17T09:00""#).expect("wall clock value");
        assert!(matches!(wall, ScheduledAt::WallClock(_)));
        assert_eq!(
            serde_json::to_string(&wall).expect("serialize"),
            r#""2026-10-17T09:00""#
        );
        assert_eq!(wall.display(&DayBoundary::Utc), "2026-10-17 09:00");

        let instant: ScheduledAt =
            serde_json::from_str(r#""2026-10-17T09:00:00.000Z""#).expect("instant");
        assert_eq!(instant, ScheduledAt::Instant(now()));
        assert_eq!(
            instant.display(&DayBoundary::Zone(chrono_tz::Europe::Berlin)),
            "2026-10-17 11:00"
        );

        assert!(serde_json::from_str::<ScheduledAt>(r#""next week""#).is_err());
    }

    #[test]
    fn find_by_id_name_and_prefix() {
        let habits = vec![fixture("abc123", "Read"), fixture("abd456", "Run")];
        assert_eq!(find_habit(&habits, "abc123").expect("id").name, "Read");
        assert_eq!(find_habit(&habits, "run").expect("name").id, "abd456");
        assert_eq!(find_habit(&habits, "abd").expect("prefix").name, "Run");
        assert_eq!(
            find_habit(&habits, "ab"),
            Err(HabitError::AmbiguousHabit("ab".to_string()))
        );
        assert_eq!(
            find_habit(&habits, "zzz"),
            Err(HabitError::UnknownHabit("zzz".to_string()))
        );
    }
}
