use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::calendar::MonthCursor;
use crate::cli::Invocation;
use crate::clock::Clock;
use crate::config::Config;
use crate::datastore::{DataStore, KeyValueStore};
use crate::dates::format_date;
use crate::datetime::{DayBoundary, parse_day_expr, parse_instant_expr};
use crate::habit::{AVAILABLE_ICONS, Habit, HabitPatch, ScheduledAt, find_habit};
use crate::render::{Renderer, short_id};
use crate::state::{Action, StateStore, TrackerState};
use crate::stats::summarize;
use crate::streak::streak;
use crate::transfer::{backup_file_name, export_backup, import_backup};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "edit",
        "delete",
        "toggle",
        "list",
        "calendar",
        "stats",
        "export",
        "import",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

fn takes_habit_selector(command: &str) -> bool {
    matches!(command, "edit" | "delete" | "toggle" | "calendar")
}

/// What a command needs besides its arguments: the instant it runs at and the
/// calendar day that instant falls on.
#[derive(Debug, Clone, Copy)]
struct Moment {
    now: DateTime<Utc>,
    today: NaiveDate,
    boundary: DayBoundary,
}

#[instrument(skip(data, cfg, renderer, clock, inv))]
pub fn dispatch<S: KeyValueStore>(
    data: &DataStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    clock: &dyn Clock,
    boundary: DayBoundary,
    mut inv: Invocation,
) -> anyhow::Result<()> {
    let now = clock.now();
    let moment = Moment {
        now,
        today: boundary.date_of(now),
        boundary,
    };
    let command = inv.command.clone();

    debug!(
        command = %command,
        selector = ?inv.selector_terms,
        args = ?inv.command_args,
        today = %moment.today,
        "dispatching command"
    );

    let selector = if takes_habit_selector(&command) {
        Some(
            inv.take_selector()
                .ok_or_else(|| anyhow!("{command}: habit name or id is required"))?,
        )
    } else {
        if !inv.selector_terms.is_empty() {
            return Err(anyhow!(
                "unexpected words before '{command}': {}",
                inv.selector_terms.join(" ")
            ));
        }
        None
    };
    let selector = selector.as_deref().unwrap_or_default();

    let mut store = StateStore::new(data.load_state().context("failed to load habit data")?);
    store.subscribe(|state| data.save_state(state));

    let args = inv.command_args.as_slice();
    match command.as_str() {
        "add" => cmd_add(&mut store, args, moment),
        "edit" => cmd_edit(&mut store, selector, args, moment),
        "delete" => cmd_delete(&mut store, selector),
        "toggle" => cmd_toggle(&mut store, selector, args, moment),
        "list" => cmd_list(store.state(), cfg, renderer, moment),
        "calendar" => cmd_calendar(store.state(), renderer, selector, args, moment),
        "stats" => cmd_stats(store.state(), renderer, moment),
        "export" => cmd_export(store.state(), args, moment),
        "import" => cmd_import(&mut store, args),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg, &boundary),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[derive(Debug, Clone)]
enum Mod {
    Name(String),
    Icon(String),
    Scheduled(Option<ScheduledAt>),
}

/// Splits `args` into plain words and `key:value` modifiers. Everything after
/// `--` is a plain word.
fn parse_words_and_mods(args: &[String], moment: Moment) -> anyhow::Result<(Vec<String>, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, moment)? {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    Ok((words, mods))
}

fn parse_one_mod(tok: &str, moment: Moment) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':').or_else(|| tok.split_once('=')) else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "name" => Ok(Some(Mod::Name(value.to_string()))),
        "icon" => Ok(Some(Mod::Icon(value.to_string()))),
        "scheduled" | "sched" => {
            if value.trim().is_empty() {
                return Ok(Some(Mod::Scheduled(None)));
            }
            let at = parse_instant_expr(value, moment.now, &moment.boundary)
                .with_context(|| format!("invalid scheduled value '{value}'"))?;
            Ok(Some(Mod::Scheduled(Some(ScheduledAt::Instant(at)))))
        }
        _ => Ok(None),
    }
}

fn patch_from_mods(mods: Vec<Mod>) -> HabitPatch {
    let mut patch = HabitPatch::default();
    for one_mod in mods {
        match one_mod {
            Mod::Name(name) => patch.name = Some(name),
            Mod::Icon(icon) => patch.icon = Some(icon),
            Mod::Scheduled(at) => patch.scheduled_at = Some(at),
        }
    }
    if let Some(icon) = &patch.icon
        && !AVAILABLE_ICONS.contains(&icon.trim())
    {
        debug!(icon = %icon, "icon is outside the suggested palette");
    }
    patch
}

#[instrument(skip(store, args, moment))]
fn cmd_add(store: &mut StateStore<'_>, args: &[String], moment: Moment) -> anyhow::Result<()> {
    info!("command add");

    let (words, mods) = parse_words_and_mods(args, moment)?;
    let patch = patch_from_mods(mods);
    let name = match (words.is_empty(), patch.name.as_deref()) {
        (false, None) => words.join(" "),
        (true, Some(name)) => name.to_string(),
        (false, Some(_)) => return Err(anyhow!("add: give the name as words or name:, not both")),
        (true, None) => return Err(anyhow!("add: habit name is required")),
    };

    let habit = Habit::new(
        &name,
        patch.icon.as_deref(),
        patch.scheduled_at.flatten(),
        moment.now,
    )?;
    let id = habit.id.clone();
    let label = format!("{} {}", habit.icon, habit.name);
    let state = store.dispatch(Action::AddHabit(habit))?;

    println!("Created habit {label} ({}).", short_id(&id, &state.habits));
    Ok(())
}

#[instrument(skip(store, args, moment))]
fn cmd_edit(
    store: &mut StateStore<'_>,
    selector: &str,
    args: &[String],
    moment: Moment,
) -> anyhow::Result<()> {
    info!("command edit");

    let (words, mods) = parse_words_and_mods(args, moment)?;
    for word in &words {
        warn!(arg = %word, "unrecognized modifier token ignored");
    }
    if mods.is_empty() {
        return Err(anyhow!(
            "edit: nothing to change (use name:, icon: or scheduled:)"
        ));
    }

    let habit_id = find_habit(&store.state().habits, selector)?.id.clone();
    let state = store.dispatch(Action::UpdateHabit {
        habit_id: habit_id.clone(),
        patch: patch_from_mods(mods),
    })?;

    if let Some(habit) = state.habit(&habit_id) {
        println!("Modified habit {} {}.", habit.icon, habit.name);
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete(store: &mut StateStore<'_>, selector: &str) -> anyhow::Result<()> {
    info!("command delete");

    let habit = find_habit(&store.state().habits, selector)?.clone();
    store.dispatch(Action::DeleteHabit {
        habit_id: habit.id.clone(),
    })?;

    println!("Deleted habit {} {} and its history.", habit.icon, habit.name);
    Ok(())
}

#[instrument(skip(store, args, moment))]
fn cmd_toggle(
    store: &mut StateStore<'_>,
    selector: &str,
    args: &[String],
    moment: Moment,
) -> anyhow::Result<()> {
    info!("command toggle");

    let date = if args.is_empty() {
        moment.today
    } else {
        parse_day_expr(&args.join(" "), moment.today)?
    };
    if date > moment.today {
        warn!(date = %date, "toggling a day in the future");
    }

    let habit = find_habit(&store.state().habits, selector)?.clone();
    let state = store.dispatch(Action::ToggleCompletion {
        habit_id: habit.id.clone(),
        date,
    })?;

    let done = state.completions.is_completed(&habit.id, date);
    println!(
        "{} {} {} on {}. Streak: {}.",
        if done { "Completed" } else { "Cleared" },
        habit.icon,
        habit.name,
        format_date(date),
        streak(&state.completions, &habit.id, moment.today)
    );
    Ok(())
}

#[instrument(skip(state, cfg, renderer, moment))]
fn cmd_list(
    state: &TrackerState,
    cfg: &Config,
    renderer: &mut Renderer,
    moment: Moment,
) -> anyhow::Result<()> {
    info!("command list");
    renderer.print_habit_table(
        &state.habits,
        &state.completions,
        moment.today,
        cfg.rate_window()?,
    )
}

/// `calendar <habit> [YYYY-MM|prev|next]`; `prev` and `next` are relative to
/// the current month.
#[instrument(skip(state, renderer, args, moment))]
fn cmd_calendar(
    state: &TrackerState,
    renderer: &mut Renderer,
    selector: &str,
    args: &[String],
    moment: Moment,
) -> anyhow::Result<()> {
    info!("command calendar");

    let habit = find_habit(&state.habits, selector)?;
    let current = MonthCursor::containing(moment.today);
    let cursor = match args.first().map(String::as_str) {
        None => current,
        Some("prev") => current.prev(),
        Some("next") => current.next(),
        Some(raw) => MonthCursor::parse(raw)?,
    };

    renderer.print_calendar(
        habit,
        cursor,
        &state.completions,
        moment.today,
        &moment.boundary,
    )
}

#[instrument(skip(state, renderer, moment))]
fn cmd_stats(state: &TrackerState, renderer: &mut Renderer, moment: Moment) -> anyhow::Result<()> {
    info!("command stats");
    let summary = summarize(&state.habits, &state.completions, moment.today);
    renderer.print_stats(&summary)
}

/// `export` and `export -` write to stdout; a directory receives a dated
/// backup file name.
#[instrument(skip(state, args, moment))]
fn cmd_export(state: &TrackerState, args: &[String], moment: Moment) -> anyhow::Result<()> {
    info!("command export");

    let out = export_backup(state, moment.now)?;
    match args.first().map(String::as_str) {
        None | Some("-") => {
            print!("{out}");
        }
        Some(raw) => {
            let path = Path::new(raw);
            let path = if path.is_dir() {
                path.join(backup_file_name(moment.today))
            } else {
                path.to_path_buf()
            };
            fs::write(&path, out)
                .with_context(|| format!("failed writing {}", path.display()))?;
            println!(
                "Exported {} habits to {}.",
                state.habits.len(),
                path.display()
            );
        }
    }
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_import(store: &mut StateStore<'_>, args: &[String]) -> anyhow::Result<()> {
    info!("command import");

    let raw = match args.first().map(String::as_str) {
        None => return Err(anyhow!("import: a file path (or - for stdin) is required")),
        Some("-") => {
            let mut stdin = String::new();
            io::stdin()
                .read_to_string(&mut stdin)
                .context("failed reading stdin")?;
            stdin
        }
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed reading {path}"))?
        }
    };

    if raw.trim().is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    let imported = import_backup(&raw)?;
    let count = imported.habits.len();
    store.dispatch(Action::Replace(imported))?;

    println!("Imported {count} habits.");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config, boundary: &DayBoundary) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    let day_boundary = match boundary {
        DayBoundary::Zone(tz) => tz.name().to_string(),
        DayBoundary::Local => "local".to_string(),
        DayBoundary::Utc => "utc".to_string(),
    };
    println!("day.boundary={day_boundary}");
    for file in &cfg.loaded_files {
        println!("habitrc.file={}", file.display());
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
Usage: habit [-v|-q] [--rc key=value] [--habitrc PATH] [--data DIR] <command> [args]

Commands (any unique prefix works):
  add <name...> [icon:<emoji>] [scheduled:<when>]
  edit <habit> [name:<text>] [icon:<emoji>] [scheduled:<when>|scheduled:]
  delete <habit>
  toggle <habit> [day]          day: today, yesterday, -3d, monday, 2026-03-14
  list
  calendar <habit> [YYYY-MM|prev|next]
  stats
  export [PATH|-]
  import <PATH|->

<habit> is an id, an id prefix or a name; multi-word names can go before the
command: habit Drink water toggle"
    );
    Ok(())
}
