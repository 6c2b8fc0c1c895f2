use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{MonthCursor, completion_level};
use crate::completions::CompletionStore;
use crate::config::Config;
use crate::dates::{WEEKDAY_ABBREVIATIONS, current_week_dates};
use crate::datetime::{DayBoundary, format_date_time};
use crate::habit::Habit;
use crate::rate::{completion_rate, round_half_up};
use crate::stats::{PerformanceTier, ProgressSummary};
use crate::streak::streak;

const ID_PREFIX_LEN: usize = 8;
const BAR_WIDTH: usize = 10;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, habits, store))]
    pub fn print_habit_table(
        &mut self,
        habits: &[Habit],
        store: &CompletionStore,
        today: NaiveDate,
        rate_window: u32,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_habit_table(out, habits, store, today, rate_window)
    }

    fn write_habit_table<W: Write>(
        &self,
        mut out: W,
        habits: &[Habit],
        store: &CompletionStore,
        today: NaiveDate,
        rate_window: u32,
    ) -> anyhow::Result<()> {
        if habits.is_empty() {
            writeln!(out, "No habits yet. Add one with: habit add <name>")?;
            return Ok(());
        }

        let week = current_week_dates(today);
        let week_header = week
            .iter()
            .map(|entry| &entry.day_name[..1])
            .collect::<Vec<_>>()
            .join(" ");

        let headers = vec![
            "ID".to_string(),
            "Habit".to_string(),
            week_header,
            "Streak".to_string(),
            format!("{rate_window}d"),
        ];

        let mut rows = Vec::with_capacity(habits.len());
        for habit in habits {
            let strip = week
                .iter()
                .map(|entry| {
                    let mark = if store.is_completed(&habit.id, entry.date) {
                        self.paint("●", "32")
                    } else {
                        "·".to_string()
                    };
                    if entry.is_today {
                        self.paint(&mark, "1")
                    } else {
                        mark
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");

            let days = streak(store, &habit.id, today);
            let streak_cell = if days > 0 {
                self.paint(&days.to_string(), "33")
            } else {
                "0".to_string()
            };

            rows.push(vec![
                self.paint(short_id(&habit.id, habits), "33"),
                format!("{} {}", habit.icon, habit.name),
                strip,
                streak_cell,
                format!("{}%", completion_rate(store, &habit.id, rate_window, today)),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, habit, store, boundary), fields(habit_id = %habit.id))]
    pub fn print_calendar(
        &mut self,
        habit: &Habit,
        cursor: MonthCursor,
        store: &CompletionStore,
        today: NaiveDate,
        boundary: &DayBoundary,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_calendar(out, habit, cursor, store, today, boundary)
    }

    fn write_calendar<W: Write>(
        &self,
        mut out: W,
        habit: &Habit,
        cursor: MonthCursor,
        store: &CompletionStore,
        today: NaiveDate,
        boundary: &DayBoundary,
    ) -> anyhow::Result<()> {
        let grid = cursor.grid(today)?;

        writeln!(out, "{} {}: {}", habit.icon, habit.name, cursor.title()?)?;
        writeln!(
            out,
            "created {}",
            format_date_time(habit.created_at, boundary)
        )?;
        if let Some(scheduled) = habit.scheduled_at {
            writeln!(out, "scheduled {}", scheduled.display(boundary))?;
        }
        writeln!(out)?;

        let header = WEEKDAY_ABBREVIATIONS
            .iter()
            .map(|name| format!("{name:>4}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{header}")?;

        let mut done_in_month = 0_usize;
        let mut days_in_month = 0_usize;
        for week in grid.chunks(7) {
            let line = week
                .iter()
                .map(|cell| {
                    if !cell.is_current_month {
                        return "    ".to_string();
                    }
                    days_in_month += 1;
                    let done = completion_level(store, &habit.id, cell.date) > 0;
                    if done {
                        done_in_month += 1;
                    }
                    let text = format!(
                        "{}{:>2}{}",
                        if cell.is_today { '>' } else { ' ' },
                        cell.day_number,
                        if done { '✓' } else { ' ' }
                    );
                    match (done, cell.is_today) {
                        (true, _) => self.paint(&text, "32"),
                        (false, true) => self.paint(&text, "1"),
                        (false, false) => text,
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{}", line.trim_end())?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "done {done_in_month}/{days_in_month} days, streak {}, 30-day rate {}%",
            streak(store, &habit.id, today),
            completion_rate(store, &habit.id, 30, today)
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, summary))]
    pub fn print_stats(&mut self, summary: &ProgressSummary) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_stats(out, summary)
    }

    fn write_stats<W: Write>(&self, mut out: W, summary: &ProgressSummary) -> anyhow::Result<()> {
        writeln!(
            out,
            "Active habits {}   7-day average {}%   This week {} completions",
            summary.active_habits, summary.seven_day_average, summary.week_total
        )?;

        if summary.rates.is_empty() {
            writeln!(out)?;
            writeln!(out, "No habits yet. Add one with: habit add <name>")?;
            return Ok(());
        }

        writeln!(out)?;
        let headers = vec![
            "Habit".to_string(),
            "7d".to_string(),
            "14d".to_string(),
            "30d".to_string(),
            "Tier".to_string(),
        ];
        let rows = summary
            .rates
            .iter()
            .map(|rate| {
                let tier = PerformanceTier::from_rate(rate.rate_7_days);
                vec![
                    format!("{} {}", rate.icon, rate.name),
                    format!("{}%", rate.rate_7_days),
                    format!("{}%", rate.rate_14_days),
                    format!("{}%", rate.rate_30_days),
                    self.paint(tier.label(), tier_color(tier)),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;

        writeln!(out)?;
        writeln!(out, "Performance (7-day rate)")?;
        for entry in &summary.tiers {
            writeln!(out, "  {:<18} {}", entry.tier.label(), entry.count)?;
        }

        writeln!(out)?;
        writeln!(out, "Last 7 days")?;
        for point in &summary.trend {
            let filled = round_half_up(usize::from(point.percentage) * BAR_WIDTH, 100);
            let bar = format!(
                "{}{}",
                "█".repeat(filled),
                "░".repeat(BAR_WIDTH.saturating_sub(filled))
            );
            writeln!(
                out,
                "  {:<6} {} {}/{} {:>3}%",
                point.label,
                self.paint(&bar, "36"),
                point.completed,
                point.total,
                point.percentage
            )?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn tier_color(tier: PerformanceTier) -> &'static str {
    match tier {
        PerformanceTier::Excellent => "32",
        PerformanceTier::Good => "36",
        PerformanceTier::Average => "33",
        PerformanceTier::NeedsWork => "31",
    }
}

/// Shortest prefix of `id`, at least eight characters, that no other habit id
/// in `habits` starts with.
pub(crate) fn short_id<'a>(id: &'a str, habits: &[Habit]) -> &'a str {
    let shared = habits
        .iter()
        .filter(|other| other.id != id)
        .map(|other| {
            id.chars()
                .zip(other.id.chars())
                .take_while(|(a, b)| a == b)
                .count()
        })
        .max()
        .unwrap_or(0);
    let len = ID_PREFIX_LEN.max(shared + 1);
    id.char_indices()
        .nth(len)
        .map_or(id, |(idx, _)| &id[..idx])
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
