use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::config::Config;

const TIMEZONE_CONFIG_FILE: &str =
  "habit-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "HABIT_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "HABIT_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Decides which calendar day an instant belongs to. Every completion key,
/// streak walk and grid cell goes through [`DayBoundary::date_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBoundary {
  Zone(Tz),
  Local,
  /// Legacy behavior: the UTC date of the instant, regardless of where the
  /// user lives. Matches data exported by older browser builds.
  Utc
}

impl DayBoundary {
  #[must_use]
  pub fn date_of(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | DayBoundary::Zone(tz) => {
        instant
          .with_timezone(tz)
          .date_naive()
      }
      | DayBoundary::Local => {
        instant
          .with_timezone(&Local)
          .date_naive()
      }
      | DayBoundary::Utc => {
        instant.date_naive()
      }
    }
  }

  pub fn to_utc(
    &self,
    local_naive: NaiveDateTime,
    context: &str
  ) -> anyhow::Result<DateTime<Utc>> {
    match self {
      | DayBoundary::Zone(tz) => {
        pick_local(
          tz.from_local_datetime(
            &local_naive
          ),
          context
        )
      }
      | DayBoundary::Local => {
        pick_local(
          Local.from_local_datetime(
            &local_naive
          ),
          context
        )
      }
      | DayBoundary::Utc => {
        Ok(Utc.from_utc_datetime(
          &local_naive
        ))
      }
    }
  }
}

fn pick_local<T: TimeZone>(
  result: LocalResult<DateTime<T>>,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match result {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in configured \
         timezone: {context}"
      ))
    }
  }
}

#[tracing::instrument(skip(cfg, data_dir))]
pub fn resolve_day_boundary(
  cfg: &Config,
  data_dir: &Path
) -> DayBoundary {
  let convention = cfg
    .get("date.convention")
    .unwrap_or_else(|| {
      "local".to_string()
    });
  if convention
    .trim()
    .eq_ignore_ascii_case("utc")
  {
    tracing::info!(
      "using utc day boundary for \
       legacy data"
    );
    return DayBoundary::Utc;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return DayBoundary::Zone(tz);
  }

  if let Some(raw) = cfg.get("timezone")
    && let Some(tz) =
      parse_timezone(&raw, "habitrc")
  {
    return DayBoundary::Zone(tz);
  }

  let path =
    timezone_config_path(data_dir);
  if let Some(tz) =
    load_timezone_from_file(&path)
  {
    return DayBoundary::Zone(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local zone"
  );
  DayBoundary::Local
}

fn timezone_config_path(
  data_dir: &Path
) -> PathBuf {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return PathBuf::from(trimmed);
    }
  }

  data_dir.join(TIMEZONE_CONFIG_FILE)
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured habit timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a day argument such as `today`, `yesterday`, `-3d`, `monday` or
/// `2026-03-14` relative to `today`. Weekday names resolve to the most recent
/// such day, today included.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "yesterday" => {
      return today.pred_opt().ok_or_else(
        || anyhow!("no day before {today}")
      );
    }
    | "tomorrow" => {
      return today.succ_opt().ok_or_else(
        || anyhow!("no day after {today}")
      );
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(previous_weekday_date(
      today,
      target_weekday
    ));
  }

  if let Some(offset) =
    parse_relative(token)?
  {
    if offset.num_seconds() % 86_400
      != 0
    {
      return Err(anyhow!(
        "day expressions only \
         accept whole days: {input}"
      ));
    }
    return today
      .checked_add_signed(offset)
      .ok_or_else(|| {
        anyhow!(
          "day expression is out of \
           range: {input}"
        )
      });
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized day expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/yesterday/tomorrow, weekday \
     names (e.g. monday), -Nd/+Nd, \
     YYYY-MM-DD"
  })
}

/// Parses an instant such as `now`, `tomorrow`, `+2h`, an RFC 3339 timestamp
/// or a local `YYYY-MM-DDTHH:MM` value. Local values are read in `boundary`.
#[tracing::instrument(skip(now, boundary), fields(input = input))]
pub fn parse_instant_expr(
  input: &str,
  now: DateTime<Utc>,
  boundary: &DayBoundary
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  if lower == "now" {
    return Ok(now);
  }

  if matches!(
    lower.as_str(),
    "today" | "yesterday" | "tomorrow"
  ) || parse_weekday_name(&lower)
    .is_some()
  {
    let day = parse_day_expr(
      token,
      boundary.date_of(now)
    )?;
    let midnight = day
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct \
           midnight for {token}"
        )
      })?;
    return boundary
      .to_utc(midnight, "day-name");
  }

  if let Some(offset) =
    parse_relative(token)?
  {
    return now
      .checked_add_signed(offset)
      .ok_or_else(|| {
        anyhow!(
          "date expression is out of \
           range: {input}"
        )
      });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    let midnight = date
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct \
           midnight for date"
        )
      })?;
    return boundary
      .to_utc(midnight, "date");
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return boundary.to_utc(ndt, fmt);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names, +Nd/+Nh/+Nm, \
     RFC3339, YYYY-MM-DD, \
     YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM"
  })
}

/// Display form of a stored timestamp, in the user's day boundary.
#[must_use]
pub fn format_date_time(
  instant: DateTime<Utc>,
  boundary: &DayBoundary
) -> String {
  const FMT: &str = "%Y-%m-%d %H:%M";
  match boundary {
    | DayBoundary::Zone(tz) => {
      instant
        .with_timezone(tz)
        .format(FMT)
        .to_string()
    }
    | DayBoundary::Local => {
      instant
        .with_timezone(&Local)
        .format(FMT)
        .to_string()
    }
    | DayBoundary::Utc => {
      instant.format(FMT).to_string()
    }
  }
}

fn parse_relative(
  token: &str
) -> anyhow::Result<Option<Duration>> {
  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  let Some(caps) =
    rel_re.captures(token)
  else {
    return Ok(None);
  };

  let sign = caps
    .name("sign")
    .map(|m| m.as_str())
    .ok_or_else(|| {
      anyhow!("missing relative sign")
    })?;
  let num: i64 = caps
    .name("num")
    .map(|m| m.as_str())
    .ok_or_else(|| {
      anyhow!("missing relative amount")
    })?
    .parse()
    .context(
      "invalid relative number"
    )?;
  let unit = caps
    .name("unit")
    .map(|m| m.as_str())
    .ok_or_else(|| {
      anyhow!("missing relative unit")
    })?;

  let duration = match unit {
    | "d" => Duration::try_days(num),
    | "h" => Duration::try_hours(num),
    | "m" => Duration::try_minutes(num),
    | _ => {
      return Err(anyhow!(
        "unknown relative unit: {unit}"
      ))
    }
  }
  .ok_or_else(|| {
    anyhow!(
      "relative offset is too large: \
       {token}"
    )
  })?;

  Ok(Some(if sign == "-" {
    -duration
  } else {
    duration
  }))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn previous_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let current = today
    .weekday()
    .num_days_from_monday()
    as i64;
  let wanted =
    target.num_days_from_monday() as i64;
  let back = (current - wanted)
    .rem_euclid(7);
  today - Duration::days(back)
}
