use std::ffi::OsString;
use std::path::Path;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use habit_core::FixedClock;
use habit_core::datastore::{DataStore, FileStore};
use habit_core::habit::Habit;
use habit_core::rate::completion_rate;
use habit_core::state::{Action, StateStore};
use habit_core::streak::streak;
use habit_core::transfer::{export_backup, import_backup};
use tempfile::tempdir;

fn clock() -> FixedClock {
    FixedClock(
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
            .single()
            .expect("valid now"),
    )
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
}

fn run(data_dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let mut argv: Vec<OsString> = vec![
        "habit".into(),
        "--habitrc".into(),
        "/dev/null".into(),
        "--data".into(),
        data_dir.as_os_str().to_owned(),
        "rc.date.convention=utc".into(),
        "rc.color=off".into(),
    ];
    argv.extend(args.iter().map(OsString::from));
    habit_core::run_with_clock(argv, &clock())
}

#[test]
fn state_updates_persist_through_subscriber() {
    let temp = tempdir().expect("tempdir");
    let data = DataStore::new(FileStore::open(temp.path()).expect("open store"));

    let habit = Habit::new("Read", Some("📚"), None, clock().0).expect("habit");
    let habit_id = habit.id.clone();
    {
        let mut store = StateStore::new(data.load_state().expect("load"));
        store.subscribe(|state| data.save_state(state));
        store.dispatch(Action::AddHabit(habit)).expect("add");
        for offset in 0..4 {
            store
                .dispatch(Action::ToggleCompletion {
                    habit_id: habit_id.clone(),
                    date: today() - Duration::days(offset),
                })
                .expect("toggle");
        }
    }

    let reloaded = DataStore::new(FileStore::open(temp.path()).expect("reopen store"))
        .load_state()
        .expect("reload");
    assert_eq!(reloaded.habits.len(), 1);
    assert_eq!(streak(&reloaded.completions, &habit_id, today()), 4);
    assert_eq!(completion_rate(&reloaded.completions, &habit_id, 7, today()), 57);
    assert!(temp.path().join("habit-tracker-habits.json").exists());
    assert!(temp.path().join("habit-tracker-completions.json").exists());
}

#[test]
fn export_import_roundtrip_through_file_store() {
    let temp = tempdir().expect("tempdir");
    let data = DataStore::new(FileStore::open(temp.path()).expect("open store"));

    let mut store = StateStore::new(Default::default());
    let habit = Habit::new("Stretch", None, None, clock().0).expect("habit");
    let habit_id = habit.id.clone();
    store.dispatch(Action::AddHabit(habit)).expect("add");
    store
        .dispatch(Action::SetCompletion {
            habit_id,
            date: today(),
            done: true,
        })
        .expect("set");

    let raw = export_backup(store.state(), clock().0).expect("export");
    let imported = import_backup(&raw).expect("import");
    assert_eq!(&imported, store.state());

    data.save_state(&imported).expect("save");
    assert_eq!(data.load_state().expect("load"), imported);
}

#[test]
fn cli_flow_add_toggle_delete() {
    let temp = tempdir().expect("tempdir");

    run(temp.path(), &["add", "Drink", "water", "icon:💧"]).expect("add");
    run(temp.path(), &["Drink water", "toggle"]).expect("toggle today");
    run(temp.path(), &["tog", "drink water", "yesterday"]).expect("toggle yesterday");
    run(temp.path(), &["list"]).expect("list");
    run(temp.path(), &["calendar", "Drink water", "prev"]).expect("calendar");
    run(temp.path(), &["stats"]).expect("stats");

    let data = DataStore::new(FileStore::open(temp.path()).expect("open store"));
    let state = data.load_state().expect("load");
    assert_eq!(state.habits.len(), 1);
    assert_eq!(state.habits[0].icon, "💧");
    let habit_id = state.habits[0].id.clone();
    assert_eq!(streak(&state.completions, &habit_id, today()), 2);

    run(temp.path(), &["edit", "Drink water", "name:Hydrate"]).expect("edit");
    assert_eq!(data.load_habits().expect("load")[0].name, "Hydrate");

    run(temp.path(), &["delete", &habit_id[..8]]).expect("delete");
    let state = data.load_state().expect("load");
    assert!(state.habits.is_empty());
    assert!(!state.completions.has_record(&habit_id));
}

#[test]
fn cli_export_then_rejected_import_leaves_data_untouched() {
    let temp = tempdir().expect("tempdir");
    let backup_dir = tempdir().expect("backup dir");

    run(temp.path(), &["add", "Meditate"]).expect("add");
    run(temp.path(), &["toggle", "Meditate"]).expect("toggle");
    run(temp.path(), &["export", &backup_dir.path().display().to_string()]).expect("export");

    let backup = backup_dir.path().join("habit-tracker-backup-2026-10-17.json");
    assert!(backup.exists());

    let bad = backup_dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"habits": []}"#).expect("write bad backup");
    let err = run(temp.path(), &["import", &bad.display().to_string()]).expect_err("rejected");
    assert!(format!("{err:#}").contains("import rejected"));

    let data = DataStore::new(FileStore::open(temp.path()).expect("open store"));
    assert_eq!(data.load_habits().expect("load").len(), 1);

    run(temp.path(), &["delete", "Meditate"]).expect("delete");
    run(temp.path(), &["import", &backup.display().to_string()]).expect("import");
    let state = data.load_state().expect("load");
    assert_eq!(state.habits[0].name, "Meditate");
    assert!(state.completions.is_completed(&state.habits[0].id, today()));
}
